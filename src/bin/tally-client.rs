//! tally-client: send one `list` or `vote <option>` request to a tally
//! server and print the response.

use tally_server::client::{self, ClientArgs};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let argv = std::env::args_os().map(|arg| arg.to_string_lossy().into_owned());
    let args = match ClientArgs::parse_args(argv) {
        Ok(args) => args,
        Err(e) => {
            let usage_error = e.use_stderr();
            let _ = e.print();
            std::process::exit(if usage_error { 1 } else { 0 });
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = tokio::io::stdout();
    if let Err(e) = client::run(&args.server, args.command.into(), &mut stdout).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
