use reqwest::Client;
use serde_json::json;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let pdf_path = args.next().ok_or("usage: client <file.pdf> [question]")?;
    let question = args
        .next()
        .unwrap_or_else(|| "What is this document about?".to_string());

    let client = Client::new();
    let base_url = "http://127.0.0.1:3000";

    println!("🔍 Testing PDF QA server");

    println!("\n📋 Health Check:");
    let health_response = client.get(format!("{}/health", base_url)).send().await?;
    println!("Status: {}", health_response.status());

    println!("\n📄 Upload:");
    let filename = Path::new(&pdf_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| pdf_path.clone());
    let upload_response = client
        .post(format!("{}/document", base_url))
        .query(&[("filename", filename.as_str())])
        .body(std::fs::read(&pdf_path)?)
        .send()
        .await?;
    println!("Status: {}", upload_response.status());
    let upload_json: serde_json::Value = upload_response.json().await?;
    println!("Response: {}", serde_json::to_string_pretty(&upload_json)?);

    println!("\n❓ Query:");
    let query_response = client
        .post(format!("{}/query", base_url))
        .json(&json!({ "query": question }))
        .send()
        .await?;
    println!("Status: {}", query_response.status());
    let query_json: serde_json::Value = query_response.json().await?;
    println!("Response: {}", serde_json::to_string_pretty(&query_json)?);

    println!("\n🧹 Clear:");
    let clear_response = client.post(format!("{}/clear", base_url)).send().await?;
    println!("Status: {}", clear_response.status());

    println!("\n✅ Client test completed!");
    Ok(())
}
