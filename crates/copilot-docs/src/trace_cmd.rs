//! `cdocs trace` and `cdocs contracts`.
//!
//! Both read a transaction trace saved as JSON (the `result` of a
//! `tenderly_traceTransaction` call, or the full JSON-RPC response).
//! `contracts` also reads block explorer `getsourcecode` responses, as an
//! object keyed by address whose values are either the full response
//! (`{"status": ..., "result": [...]}`) or just the `result` array.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};

use copilot_docs_core::trace::{
    assemble_contract_sources, contract_token_budget, recipient_addresses, AddressContracts,
    ContractSource,
};

use crate::backends;
use crate::config::Config;

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Unwrap a JSON-RPC envelope if present.
fn trace_object(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("result") && !map.contains_key("trace") => {
            map.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Explorer entries for `address` from the sources file.
fn contracts_for(sources: &Value, address: &str) -> Result<Vec<ContractSource>> {
    let Some(entry) = sources.as_object().and_then(|m| {
        m.get(address).or_else(|| {
            m.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(address))
                .map(|(_, v)| v)
        })
    }) else {
        return Ok(Vec::new());
    };

    let result = match entry {
        Value::Array(_) => entry.clone(),
        Value::Object(m) => match m.get("result") {
            Some(r @ Value::Array(_)) => r.clone(),
            // Unverified or failed lookups carry a message string here.
            _ => return Ok(Vec::new()),
        },
        _ => bail!("Unexpected source entry for {}", address),
    };
    serde_json::from_value(result).with_context(|| format!("Invalid source entries for {}", address))
}

/// `cdocs trace <trace.json>`: list recipient addresses.
pub fn run_trace(trace_path: &Path) -> Result<()> {
    let trace = trace_object(read_json(trace_path)?);
    for address in recipient_addresses(&trace)? {
        println!("{}", address);
    }
    Ok(())
}

/// `cdocs contracts <trace.json> <sources.json>`: print the budgeted
/// debugging context as JSON.
pub async fn run_contracts(config: &Config, trace_path: &Path, sources_path: &Path) -> Result<()> {
    let trace = trace_object(read_json(trace_path)?);
    let sources = read_json(sources_path)?;

    let entries = recipient_addresses(&trace)?
        .into_iter()
        .map(|address| {
            let result = contracts_for(&sources, &address)?;
            Ok(AddressContracts { address, result })
        })
        .collect::<Result<Vec<_>>>()?;

    let counter = backends::load_context_tokenizer(config).await?;
    let budget = contract_token_budget(config.retrieval.context_token_limit);
    let contracts = assemble_contract_sources(&entries, counter.as_ref(), budget)?;

    let out = json!({
        "transaction_trace": trace,
        "contracts_source_code": contracts,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
