use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    map_controller::{raw_zoom, zoom_scale},
    EventMapApp, EventService, FixedLocationBackend, LocationBackend, MapScreen,
    MissingEventService, Route, SignupForm, SubmitOutcome, SupabaseEventService,
};
use shared::domain::{Coordinates, UserId, ViewportRegion};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{
    apply_overrides, load_settings, normalize_database_url, Overrides, Settings,
    DEFAULT_CONFIG_FILE,
};

#[derive(Parser, Debug)]
#[command(name = "eventmap", about = "Nearby events from the command line")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    Logout,
    Whoami,
    /// Marker scale for a map latitude span.
    Zoom {
        #[arg(long, allow_negative_numbers = true)]
        latitude_delta: f64,
    },
    /// Markers around the current location at the given span.
    Markers {
        #[arg(long, default_value_t = client_core::map_controller::DEFAULT_LATITUDE_DELTA)]
        latitude_delta: f64,
        #[arg(long)]
        json: bool,
    },
    Locate,
    CreateEvent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        timing: String,
        #[arg(long)]
        end_time: Option<String>,
    },
    Events,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    if let Command::Zoom { latitude_delta } = args.command {
        return print_zoom(latitude_delta);
    }

    let mut settings = load_settings(&args.config);
    apply_overrides(&mut settings, args.overrides);
    let app = build_app(&settings).await?;

    match args.command {
        Command::Login { email, password } => {
            let session = app
                .session()
                .login(&email, &password)
                .await
                .context("Login failed. Please try again.")?;
            println!("Signed in as {}", session.email);
        }
        Command::Signup {
            name,
            email,
            password,
            confirm_password,
        } => {
            let form = SignupForm {
                name,
                email,
                password,
                confirm_password,
            };
            form.validate()?;
            let session = app
                .session()
                .signup(&form.email, &form.password, &form.name)
                .await
                .context("Signup failed. Please try again.")?;
            println!("Welcome, {}", session.display_name.as_deref().unwrap_or(&session.email));
        }
        Command::Logout => {
            app.session().logout().await;
            println!("Signed out");
        }
        Command::Whoami => match app.session().current_session().await {
            Some(session) => {
                println!("[{}] {}", session.avatar_initial(), session.email);
                if let Some(name) = session.display_name {
                    println!("{name}");
                }
            }
            None => println!("Not signed in"),
        },
        Command::Zoom { .. } => unreachable!("handled before the app is built"),
        Command::Markers {
            latitude_delta,
            json,
        } => {
            require_tabs(&app).await?;
            let mut screen = app.mount_map_screen();
            let fix = load_screen(&mut screen).await?;
            screen
                .on_region_change(ViewportRegion::centered_on(fix, latitude_delta, latitude_delta))
                .context("map is not open")??;

            let placed = screen.placed_markers();
            if json {
                let markers: Vec<_> = placed.iter().map(|p| p.marker).collect();
                println!("{}", serde_json::to_string_pretty(&markers)?);
            } else {
                for p in placed {
                    println!(
                        "#{:<4} {:<24} ({:.5}, {:.5}) {} {} scale={:.3}",
                        p.marker.id.0,
                        p.marker.title,
                        p.marker.latitude,
                        p.marker.longitude,
                        p.marker.icon,
                        p.marker.theme_color,
                        p.scale.value()
                    );
                }
            }
        }
        Command::Locate => {
            let mut screen = app.mount_map_screen();
            let fix = load_screen(&mut screen).await?;
            println!("{:.5}, {:.5}", fix.latitude, fix.longitude);
        }
        Command::CreateEvent {
            name,
            description,
            timing,
            end_time,
        } => {
            require_tabs(&app).await?;
            let mut screen = app.mount_map_screen();
            load_screen(&mut screen).await?;
            screen.set_end_time(end_time);

            let form = screen.form_mut();
            form.open();
            form.set_name(name);
            form.set_description(description);
            form.set_timing(timing);

            match screen.submit_event().await? {
                SubmitOutcome::Created(record) => {
                    println!("Created event #{} \"{}\"", record.id.0, record.title)
                }
                SubmitOutcome::Incomplete => {
                    bail!("Event name, description and timing are all required")
                }
                SubmitOutcome::Failed(err) => bail!("Could not create event: {err}"),
                SubmitOutcome::Detached => bail!("Event screen closed before the event was saved"),
            }
        }
        Command::Events => {
            for event in app.events().list_events().await? {
                println!(
                    "#{:<4} {:<24} {:<12} ({:.5}, {:.5})",
                    event.id.0, event.title, event.start_time, event.latitude, event.longitude
                );
            }
        }
    }

    Ok(())
}

fn print_zoom(latitude_delta: f64) -> Result<()> {
    let region = ViewportRegion {
        latitude: 0.0,
        longitude: 0.0,
        latitude_delta,
        longitude_delta: latitude_delta,
    };
    let scale = zoom_scale(&region)?;
    println!(
        "zoom={:.3} scale={:.3}",
        raw_zoom(latitude_delta),
        scale.value()
    );
    Ok(())
}

async fn build_app(settings: &Settings) -> Result<EventMapApp> {
    let database_url = normalize_database_url(&settings.database_url);
    let store = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open session storage at '{database_url}'"))?;

    let events: Arc<dyn EventService> = match (&settings.supabase_url, &settings.supabase_anon_key)
    {
        (Some(url), Some(key)) => {
            let service = SupabaseEventService::new(url, key.clone())?;
            match &settings.supabase_access_token {
                Some(token) => Arc::new(service.with_access_token(token.clone())),
                None => Arc::new(service),
            }
        }
        _ => {
            info!("no event service configured");
            Arc::new(MissingEventService)
        }
    };

    let position = Coordinates::new(settings.latitude, settings.longitude);
    let location: Arc<dyn LocationBackend> = if settings.location_granted {
        Arc::new(FixedLocationBackend::granted(position))
    } else {
        Arc::new(FixedLocationBackend::denied())
    };

    Ok(EventMapApp::start(Arc::new(store), events, location)
        .await
        .with_user_id(settings.user_id.map(UserId)))
}

async fn require_tabs(app: &EventMapApp) -> Result<()> {
    if app.route().await == Route::Auth {
        bail!("Sign in first: eventmap login --email <EMAIL> --password <PASSWORD>");
    }
    Ok(())
}

async fn load_screen(screen: &mut MapScreen) -> Result<Coordinates> {
    match screen.load().await {
        Ok(fix) => Ok(fix),
        Err(err) => {
            let state = screen.location_state();
            bail!("{}", state.error_message().map(str::to_string).unwrap_or_else(|| err.to_string()))
        }
    }
}
