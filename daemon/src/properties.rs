//! Property store backed by the real Android plumbing: `getprop`/`setprop`
//! for properties, init's `start`/`stop` helpers for service control.

use async_trait::async_trait;
use tokio::process::Command;

use modemtrace::mts::{MtsError, PropertyStore};

pub struct AndroidPropertyStore;

async fn run(program: &str, args: &[&str]) -> Result<std::process::Output, MtsError> {
    let command = format!("{program} {}", args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| MtsError::Exec {
            command: command.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(MtsError::CommandFailed {
            command,
            detail: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output)
}

#[async_trait]
impl PropertyStore for AndroidPropertyStore {
    async fn set_property(&self, key: &str, value: &str) -> Result<(), MtsError> {
        run("setprop", &[key, value]).await?;
        Ok(())
    }

    async fn get_property(&self, key: &str) -> Result<Option<String>, MtsError> {
        let output = run("getprop", &[key]).await?;
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(value))
    }

    async fn exec(&self, command: &str) -> Result<(), MtsError> {
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            return Err(MtsError::CommandFailed {
                command: command.to_string(),
                detail: "empty command".to_string(),
            });
        };
        let args: Vec<&str> = parts.collect();
        run(program, &args).await?;
        Ok(())
    }
}
