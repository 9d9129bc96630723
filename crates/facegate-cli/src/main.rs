mod config;
mod presenter;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use facegate_core::presenter::IDENTIFIED_WINDOW;
use facegate_core::{
    AuthOutcome, FaceStore, OnnxEmbedder, Presenter, PresenterError, WorkflowError, WorkflowOptions,
};
use facegate_hw::Camera;
use image::DynamicImage;
use presenter::{say, RawModeGuard, TerminalPresenter};
use std::io::{self, Write};

#[derive(Parser)]
#[command(name = "facegate", about = "Webcam face registration and login")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu: 1 Registration, 2 Login, q quit (default)
    Menu,
    /// Register the face in front of the camera under a name
    Register,
    /// Scan until a registered face is recognised (press q to stop)
    Login,
    /// List registered names
    List {
        /// Print as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Remove a registered user's image and embedding
    Remove {
        /// Display name used at registration
        name: String,
    },
    /// List V4L2 capture devices
    Devices,
}

/// Everything a registration or login needs, opened once per process.
struct Session {
    camera: Camera,
    embedder: OnnxEmbedder,
    presenter: TerminalPresenter,
    store: FaceStore,
    options: WorkflowOptions,
}

impl Session {
    fn open(config: &Config) -> Result<Self> {
        let camera = Camera::open(&config.camera_device, config.frame_width, config.frame_height)
            .with_context(|| format!("opening camera {}", config.camera_device))?;
        let embedder = OnnxEmbedder::load(&config.model_dir, config.similarity_threshold)
            .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
        tracing::info!(
            device = %config.camera_device,
            width = camera.width,
            height = camera.height,
            models = %config.model_dir.display(),
            "session ready"
        );
        Ok(Self {
            camera,
            embedder,
            presenter: TerminalPresenter::new(config.display_dir()),
            store: store_for(config),
            options: WorkflowOptions {
                capture_retries: config.capture_retries,
            },
        })
    }

    fn register(&mut self) -> Result<(), WorkflowError> {
        let enrollment = facegate_core::register(
            &mut self.camera,
            &mut self.embedder,
            &mut self.presenter,
            &self.store,
            &self.options,
        )?;
        let face = DynamicImage::ImageLuma8(enrollment.face_image).to_rgb8();
        self.presenter
            .show_frame(IDENTIFIED_WINDOW, &face, Some(&enrollment.name))?;
        Ok(())
    }

    fn login(&mut self) -> Result<(), WorkflowError> {
        say("Scanning for a registered face. Press q to stop.").map_err(PresenterError::from)?;
        let outcome = {
            let _raw = RawModeGuard::enable().map_err(PresenterError::from)?;
            facegate_core::authenticate(
                &mut self.camera,
                &mut self.embedder,
                &mut self.presenter,
                &self.store,
                &self.options,
            )?
        };
        if let AuthOutcome::Cancelled = outcome {
            println!("Login cancelled.");
        }
        Ok(())
    }

    fn menu(&mut self) -> Result<()> {
        loop {
            println!();
            println!("[1] Registration   [2] Login   [q] Quit");
            print!("> ");
            io::stdout().flush()?;
            let Some(choice) = presenter::read_line(&mut io::stdin().lock())? else {
                return Ok(());
            };
            let result = match choice.trim() {
                "1" => self.register(),
                "2" => self.login(),
                "q" | "Q" => return Ok(()),
                "" => continue,
                other => {
                    println!("Unknown choice: {other}");
                    continue;
                }
            };
            report(result);
        }
    }
}

/// Log a workflow failure and keep the menu alive.
fn report(result: Result<(), WorkflowError>) {
    match result {
        Ok(()) => {}
        // The operator has already been told.
        Err(WorkflowError::NoFaceDetected) => {}
        Err(WorkflowError::NameNotProvided) => println!("Registration cancelled: no name entered."),
        Err(e) => {
            tracing::error!(error = %e, "workflow failed");
            println!("Error: {e}");
        }
    }
}

fn store_for(config: &Config) -> FaceStore {
    FaceStore::new(config.images_dir(), config.embeddings_dir())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => Session::open(&config)?.menu()?,
        Commands::Register => Session::open(&config)?.register()?,
        Commands::Login => Session::open(&config)?.login()?,
        Commands::List { json } => {
            let names = store_for(&config).embeddings.names()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else if names.is_empty() {
                println!("No users registered");
            } else {
                for name in names {
                    println!("{name}");
                }
            }
        }
        Commands::Remove { name } => {
            if store_for(&config).remove(&name)? {
                println!("Removed {name}");
            } else {
                anyhow::bail!("no registered user named {name:?}");
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}
