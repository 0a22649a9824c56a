use clap::Parser;
use libthinlink::LinkRequest;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(version, about)]
struct Args {
    /// Path to a link request, in TOML.
    request: PathBuf,

    /// Print how long each planning phase takes, instead of logging.
    #[clap(long)]
    time: bool,
}

fn main() {
    if let Err(error) = run() {
        libthinlink::error::report_error_and_exit(&error)
    }
}

fn run() -> libthinlink::error::Result {
    let args = Args::parse();
    libthinlink::init_tracing(args.time)?;
    let plan = LinkRequest::load(&args.request)?.plan()?;
    print!("{}", plan.to_toml()?);
    Ok(())
}
