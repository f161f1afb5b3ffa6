use std::io::{self, BufWriter};
use std::path::PathBuf;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use nagcfg::error::Result;
use nagcfg::schema::SORT_ORDER;
use nagcfg::session::Session;
use nagcfg::settings::Settings;

/// Reads the configured sources (or stdin when there are none), removes
/// duplicate services and writes everything back. The only argument is an
/// optional settings file.
fn main() -> Result<()> {
    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(settings_path.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    SORT_ORDER.validate()?;

    let sources = settings.sources.clone();
    let split_output = settings.split_output;
    let mut session = Session::with_settings(settings);
    info!(session = %session.id(), sources = sources.len(), "starting");

    if sources.is_empty() {
        session.load_reader(io::stdin().lock())?;
    } else {
        for failure in session.load_files(&sources)? {
            warn!(provenance = %failure.provenance, error = %failure.error, "source skipped");
        }
    }
    session.remove_duplicate_services();

    if split_output && !session.from_pipe() {
        match session.write_back() {
            Ok(report) => info!(files = report.destinations, objects = report.objects, "written back"),
            Err(e) => {
                error!(error = %e, "write back failed");
                return Err(e);
            }
        }
    } else {
        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        session.write_stream(&mut out)?;
    }
    Ok(())
}
