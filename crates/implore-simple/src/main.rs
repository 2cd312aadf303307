//! implore-simple demo binary
//!
//! Starts a session against the in-process engine, loads a small plugin
//! namespace and lists the exported names. Set `RUST_LOG=debug` to watch
//! the export set being built.

use implore_simple::{
    Args, CallError, FnCallable, LocalEngine, Properties, PropertyValue, SessionConfig,
    SessionContext, StaticNamespace,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = SessionConfig::load_standard()?;
    let mut session = SessionContext::new(LocalEngine::new(), config);

    let outcome = session.initialize()?;
    tracing::info!("Session {} started: {:?}", session.id(), outcome);

    let report = session.extend_namespace(&[]);
    tracing::info!("{} constructors exported", report.exports.added.len());

    let demo = StaticNamespace::new("demo").with(
        FnCallable::new("Scale", |args: &Args| {
            let value = args.require_float("value", 0)?;
            let factor = args.lookup("factor", 1).and_then(PropertyValue::as_float).unwrap_or(2.0);
            if !factor.is_finite() {
                return Err(CallError::Failed("factor must be finite".to_string()));
            }
            Ok(PropertyValue::Float(value * factor))
        })
        .with_description("Multiply a value by a factor"),
    );
    session.load_plugin(&demo)?;

    session.create_source("SphereSource", Properties::new().with("Radius", 2.0))?;
    session.show(None, None)?;
    let view = session.render(None)?;
    println!("Rendered {}", session.registration_name(&view)?);

    let scaled = session.invoke("Scale", &Args::new().arg(21.0))?;
    println!("Scale(21.0) = {:?}", scaled);

    println!("Exported names:");
    for name in session.exports().iter() {
        match session.namespaces().describe(name) {
            Some(description) => println!("  {} - {}", name, description),
            None => println!("  {}", name),
        }
    }

    Ok(())
}
