//! Transaction-trace helpers.
//!
//! Pure pieces of transaction debugging: pulling hashes and addresses
//! out of free text, listing the contracts a trace calls into without a
//! decoded ABI, and packing verified contract sources into a token
//! budget. Fetching traces and sources over the network is left to the
//! caller.

use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::{bail, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::tokenize::TokenCounter;

/// Tokens held back from the context limit when packing contract sources.
pub const TRACE_TOKEN_RESERVE: usize = 1000;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

static TX_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[a-fA-F0-9]{64}").expect("valid tx hash pattern"));

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b0x[a-fA-F0-9]{40}\b").expect("valid address pattern"));

/// First `0x`-prefixed 64-hex-digit transaction hash in `text`.
pub fn extract_tx_hash(text: &str) -> Option<String> {
    TX_HASH_RE.find(text).map(|m| m.as_str().to_string())
}

/// All distinct 20-byte addresses in `text`, in first-seen order.
///
/// Hex runs longer than 40 digits (such as transaction hashes) do not
/// match, and the zero address is dropped.
pub fn extract_addresses(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ADDRESS_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|a| *a != ZERO_ADDRESS)
        .filter(|a| seen.insert(a.to_string()))
        .map(str::to_string)
        .collect()
}

/// Distinct `to` addresses of trace steps that carry no `decodedInput`.
///
/// `trace` is a trace object with a `trace` array of call steps.
pub fn recipient_addresses(trace: &Value) -> Result<Vec<String>> {
    let Some(steps) = trace.get("trace").and_then(Value::as_array) else {
        bail!("trace object has no 'trace' array");
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        if step.get("decodedInput").is_some() {
            continue;
        }
        let Some(to) = step.get("to").and_then(Value::as_str) else {
            bail!("trace step {} has no 'to' address", i);
        };
        if seen.insert(to.to_string()) {
            out.push(to.to_string());
        }
    }
    Ok(out)
}

/// One entry of a block explorer `getsourcecode` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSource {
    #[serde(rename = "ContractName", default)]
    pub contract_name: String,
    #[serde(rename = "SourceCode", default)]
    pub source_code: String,
}

/// Explorer response for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressContracts {
    pub address: String,
    #[serde(default)]
    pub result: Vec<ContractSource>,
}

/// Verified sources kept for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSources {
    pub address: String,
    pub sources: Vec<String>,
}

/// Pack verified contract sources into `token_limit` tokens.
///
/// Unverified entries (empty source) are skipped and each contract name
/// is kept once. Once a source would push the total past the limit,
/// nothing further is included. Every input address appears in the
/// output, in input order, possibly with no sources.
pub fn assemble_contract_sources(
    entries: &[AddressContracts],
    counter: &dyn TokenCounter,
    token_limit: usize,
) -> Result<Vec<AddressSources>> {
    let mut seen_names = HashSet::new();
    let mut total = 0usize;
    let mut exhausted = false;
    let mut out = Vec::with_capacity(entries.len());

    for entry in entries {
        let mut sources = Vec::new();
        for contract in &entry.result {
            if exhausted {
                break;
            }
            if contract.source_code.is_empty() || seen_names.contains(&contract.contract_name) {
                continue;
            }
            let tokens = counter.count_tokens(&contract.source_code)?;
            if total + tokens > token_limit {
                debug!(address = %entry.address, contract = %contract.contract_name, tokens, total, "contract source budget exhausted");
                exhausted = true;
                break;
            }
            total += tokens;
            seen_names.insert(contract.contract_name.clone());
            sources.push(contract.source_code.clone());
        }
        out.push(AddressSources {
            address: entry.address.clone(),
            sources,
        });
    }

    Ok(out)
}

/// Budget for contract sources given a context token limit.
pub fn contract_token_budget(context_token_limit: usize) -> usize {
    context_token_limit.saturating_sub(TRACE_TOKEN_RESERVE)
}
