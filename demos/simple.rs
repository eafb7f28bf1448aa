//! Example: Send a basic span to an APM intake endpoint.
//!
//! Usage:
//!     cargo run --example simple <INTAKE_URL>

use fastrace::{collector::Config, prelude::*};
use fastrace_elastic_apm::{ApmReporter, opentelemetry_semantic_mapping};
use std::{env, time::Duration};

#[fastrace::trace]
async fn child() {
    LocalSpan::add_property(|| ("server.address", "localhost:3000"));
    LocalSpan::add_property(|| ("http.request.method", "GET"));
    LocalSpan::add_property(|| ("url.path", "/"));
    LocalSpan::add_property(|| ("http.response.status_code", "200"));
    LocalSpan::add_property(|| ("span.kind", "client"));

    tokio::time::sleep(Duration::from_secs(1)).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <INTAKE_URL>", args[0]);
        std::process::exit(1);
    }
    let intake_url = &args[1];

    let reporter = ApmReporter::builder()
        .endpoint(intake_url)
        .attribute_name_mappings(opentelemetry_semantic_mapping())
        .error_handler(|err| eprintln!("could not deliver span: {err}"))
        .build();

    fastrace::set_reporter(reporter, Config::default());

    {
        let root = Span::root("simple", SpanContext::random());
        let _guard = root.set_local_parent();
        child().await
    }

    // The reporter drives its own runtime, so flush off the async worker.
    std::thread::spawn(fastrace::flush)
        .join()
        .expect("flush thread panicked");
}
