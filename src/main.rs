use diagflow::{catalog, run_demo, AppConfig, CoreError, DomainError, CONFIG};
use log::error;

const USAGE: &str = "uso: diagflow demo [ct|omics] [--subject <ID>] | diagflow config";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args).await {
        error!("{e}");
        eprintln!("[diagflow] {e}");
        std::process::exit(match e {
                               CoreError::Domain(_) | CoreError::Config(_) => 2,
                               _ => 1,
                           });
    }
}

async fn run(args: &[String]) -> Result<(), CoreError> {
    match args.first().map(String::as_str) {
        // Configuración efectiva (valores por defecto si el entorno es inválido).
        Some("config") => print_json(&*CONFIG),
        Some("demo") => {
            let config = AppConfig::from_env()?;
            let mut analysis = catalog::CT_DIAGNOSIS;
            let mut subject = "P-0001".to_string();
            let mut i = 1;
            while i < args.len() {
                match args[i].as_str() {
                    "ct" => analysis = catalog::CT_DIAGNOSIS,
                    "omics" => analysis = catalog::OMICS_MULTI,
                    "--subject" => {
                        i += 1;
                        subject = args.get(i)
                                      .cloned()
                                      .ok_or_else(|| DomainError::Validation("--subject requiere un valor".into()))?;
                    }
                    other => return Err(DomainError::Validation(format!("argumento desconocido: {other}")).into()),
                }
                i += 1;
            }
            let report = run_demo(analysis, &subject, config.controller_config()?).await?;
            print_json(&report)
        }
        _ => Err(DomainError::Validation(USAGE.into()).into()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CoreError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CoreError::Internal(e.to_string()))?;
    println!("{text}");
    Ok(())
}
