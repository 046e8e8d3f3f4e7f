use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignupFormError {
    #[error("Please fill in all fields")]
    MissingFields,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
}

/// Fields of the sign-up screen, checked before the session store is asked
/// to create a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), SignupFormError> {
        if [
            &self.name,
            &self.email,
            &self.password,
            &self.confirm_password,
        ]
        .iter()
        .any(|field| field.is_empty())
        {
            return Err(SignupFormError::MissingFields);
        }

        if self.password != self.confirm_password {
            return Err(SignupFormError::PasswordMismatch);
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SignupFormError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }

        Ok(())
    }
}
