use std::process::ExitCode;
use sysdemo::commands::{self, Cli};
use sysdemo::utils::logger::init_logger;
use sysdemo::Settings;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{}", err.user_message());
            return ExitCode::from(1);
        }
    };

    // CLI flag wins over the settings file; RUST_LOG applies when neither is set
    let log_level = cli.log_level.as_deref().or(settings.log_level.as_deref());
    if let Err(err) = init_logger(log_level, cli.log_file.clone()) {
        eprintln!("Failed to initialize logging: {err}");
        return ExitCode::from(1);
    }

    match commands::execute(cli.command, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(category = %err.category(), "{err}");
            eprintln!("{}", err.user_message());
            ExitCode::from(1)
        }
    }
}
