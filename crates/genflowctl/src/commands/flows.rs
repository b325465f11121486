use anyhow::{bail, Result};
use genflow_runtime::Runtime;
use serde_json::json;

pub fn execute(runtime: &Runtime, output: &str) -> Result<()> {
    print!("{}", render(runtime, output)?);
    Ok(())
}

fn render(runtime: &Runtime, output: &str) -> Result<String> {
    let flows = runtime.registry().list();

    match output {
        "json" => {
            let items: Vec<_> = flows
                .iter()
                .map(|flow| {
                    json!({
                        "name": flow.name(),
                        "shape": flow.shape(),
                        "mode": flow.mode(),
                        "description": flow.definition().description,
                    })
                })
                .collect();
            Ok(format!("{}\n", serde_json::to_string_pretty(&items)?))
        }
        "text" => {
            let mut out = format!("{:<32} {:<12} {:<8}\n", "NAME", "SHAPE", "MODE");
            for flow in flows {
                let mode = serde_json::to_value(flow.mode())?;
                out.push_str(&format!(
                    "{:<32} {:<12} {:<8}\n",
                    flow.name(),
                    flow.shape().to_string(),
                    mode.as_str().unwrap_or_default()
                ));
            }
            Ok(out)
        }
        other => bail!("Unknown output format: {} (expected text or json)", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genflow_core::GenflowConfig;

    #[tokio::test]
    async fn test_render_formats() {
        let runtime = Runtime::from_config(&GenflowConfig::default()).await.unwrap();

        let text = render(&runtime, "text").unwrap();
        assert!(text.starts_with("NAME"));
        assert!(text.lines().any(|l| l.starts_with("analyzeSuppliers") && l.contains("custom")));
        assert_eq!(text.lines().count(), 11);

        let json: serde_json::Value = serde_json::from_str(&render(&runtime, "json").unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 10);
        assert_eq!(json[0]["name"], "analyzeSuppliers");
        assert_eq!(json[0]["mode"], "live");

        assert!(render(&runtime, "yaml").is_err());
    }
}
