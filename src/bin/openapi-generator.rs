//! Print the OpenAPI document, or write it to the path given as first argument.

use std::{env, fs};

use anyhow::Context;
use divi_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi()
        .to_pretty_json()
        .context("failed to serialize the OpenAPI document")?;

    match env::args().nth(1) {
        Some(path) => {
            fs::write(&path, doc).with_context(|| format!("failed to write {path}"))?;
        }
        None => println!("{doc}"),
    }
    Ok(())
}
