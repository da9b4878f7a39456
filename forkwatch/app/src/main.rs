// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

pub use forkwatch_app_options as options;
pub use forkwatch_app_settings as settings;
use tracing_subscriber::fmt;

mod cmd;

#[derive(Debug)]
enum AppExitCode {
    /// The monitor exited with an unknown error
    UnknownError = 1,
}

fn init_tracing(opts: &options::Options) {
    let console_filter = opts.log_filter().expect("invalid filter");

    // log all traces to stderr (reserving stdout for any actual output
    // such as the report tables)
    let subscriber = fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(console_filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Unable to set a global collector");
}

/// Install a panic handler that prints stuff to the logs, otherwise it only shows up in the console.
fn init_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        // Do the default first, just in case logging fails too.
        default_hook(info);

        let stacktrace = std::backtrace::Backtrace::force_capture();

        tracing::error!(
            stacktrace = stacktrace.to_string(),
            info = info.to_string(),
            "panicking"
        );
    }))
}

#[tokio::main]
async fn main() {
    let opts = options::parse();

    init_tracing(&opts);

    init_panic_handler();

    if let Err(e) = cmd::exec(&opts).await {
        tracing::error!("failed to execute {:?}: {e:?}", opts);
        std::process::exit(AppExitCode::UnknownError as i32);
    }
}
