#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = paneflip::run_from_env() {
        if tracing::dispatcher::has_been_set() {
            tracing::error!(target: "paneflip", error = %error, "fatal");
        } else {
            eprintln!("paneflip: {error}");
        }
        std::process::exit(error.exit_code());
    }
}
