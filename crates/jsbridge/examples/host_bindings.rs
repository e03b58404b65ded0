//! Drive an engine through the bridge: globals, host functions, calls and
//! compiled scripts.
//!
//! Runs on the scripted test engine by default; build with `--features v8`
//! to run the same program on V8.

use jsbridge::{platform, Engine, EngineInstance, GlobalScope, InitOptions, InstanceOptions};

const BOOTSTRAP: &str = r#"
function describeHost(caller) {
    return caller + ' -> ' + host.info.name + ' v' + host.info.version;
}
console.log('[script] bootstrap loaded', greeting);
host.echo('bootstrap')
"#;

const COMPILED: &str = r#"
console.log('[compiled] calling host.echo');
var echoed = host.echo('[compiled] run');
describeHost('compiled snippet') + ' / product ' + multiply('3', '5') + ' / ' + echoed
"#;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    #[cfg(feature = "v8")]
    let outcome = run::<jsbridge::backend::v8::V8Engine>();
    #[cfg(not(feature = "v8"))]
    let outcome = run::<jsbridge_testkit::ScriptedEngine>();

    if let Err(err) = outcome {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run<E: Engine>() -> jsbridge::Result<()> {
    platform::initialize::<E>(&InitOptions::default())?;

    let mut instance = EngineInstance::<E>::new(&InstanceOptions::default())?;
    let mut scope = instance.create_scope()?;

    install_host_bindings(&scope)?;
    scope.set_global_string("greeting", "Hello from Rust!")?;
    scope.set_global_string("host.info.name", "jsbridge")?;
    scope.set_global_number("host.info.version", 1.0)?;

    println!("[rust] evaluate -> {}", scope.evaluate(BOOTSTRAP)?);
    println!(
        "[rust] call_function -> {}",
        scope.call_function("describeHost", &[Some("rust entry point")])?
    );

    let mut script = instance.compile(COMPILED)?;
    println!("[rust] script run -> {}", script.run(&scope)?);
    println!("[rust] registered: {:?}", scope.registered_functions());

    script.dispose();
    scope.dispose();
    instance.dispose();
    Ok(())
}

fn install_host_bindings<E: Engine>(scope: &GlobalScope<E>) -> jsbridge::Result<()> {
    scope.add_function("console.log", |args| {
        println!("[js] {}", args.join(" "));
        Ok(None)
    })?;
    scope.add_function("host.echo", |args| {
        Ok(Some(format!("echo: {}", args.first().map_or("", String::as_str))))
    })?;
    scope.add_function("multiply", |args| {
        let product = args
            .iter()
            .map(|a| a.parse::<f64>().map_err(|e| format!("invalid number '{}': {}", a, e)))
            .product::<Result<f64, String>>()?;
        Ok(Some(product.to_string()))
    })?;
    Ok(())
}
