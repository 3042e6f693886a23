//! Writes the service's OpenAPI document.
//!
//!   cargo run --bin generate_openapi > openapi.json
//!   cargo run --bin generate_openapi -- --output openapi.json --server http://host:8080

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use telemetry_service::api::handlers::ApiDoc;
use utoipa::{openapi::server::Server, OpenApi};

#[derive(Debug, Default, PartialEq)]
struct Args {
    output: Option<PathBuf>,
    /// Base URL advertised in `servers`, for generated device clients.
    server: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(flag) = args.next() {
        let value = args.next().with_context(|| format!("{flag} expects a value"))?;
        match flag.as_str() {
            "--output" => parsed.output = Some(PathBuf::from(value)),
            "--server" => parsed.server = Some(value),
            other => bail!("unknown argument {other}"),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    let mut doc = ApiDoc::openapi();
    if let Some(url) = &args.server {
        doc.servers = Some(vec![Server::new(url)]);
    }
    let json = doc
        .to_pretty_json()
        .context("failed to serialise OpenAPI document")?;

    match args.output {
        Some(path) => {
            fs::write(&path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("OpenAPI document written to {}", path.display());
        }
        None => io::stdout()
            .write_all(json.as_bytes())
            .context("failed to write to stdout")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Result<Args> {
        parse_args(raw.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_writes_to_stdout() {
        assert_eq!(args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn output_and_server_are_parsed() {
        let parsed = args(&["--server", "http://gw:8080", "--output", "api.json"]).unwrap();
        assert_eq!(parsed.output, Some(PathBuf::from("api.json")));
        assert_eq!(parsed.server.as_deref(), Some("http://gw:8080"));
    }

    #[test]
    fn dangling_or_unknown_flags_fail() {
        assert!(args(&["--output"]).is_err());
        assert!(args(&["--verbose", "yes"]).is_err());
    }
}
