use utoipa::OpenApi;

use folio_api::docs::ApiDoc;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi();
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
