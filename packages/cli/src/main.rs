use clap::Parser;

use storewrap_cli::Args;

fn main() {
    let args = Args::parse();
    storewrap_cli::init_logging(args.verbose);

    let stdout = std::io::stdout();
    if let Err(e) = storewrap_cli::run(&args, &mut stdout.lock()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
