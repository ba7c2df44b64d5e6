use crate::{
    AbiError,
    Result,
    binding::{
        EventSignature,
        FunctionSignature,
    },
};
use alloy_primitives::{
    B256,
    Selector,
};
use sha2::{
    Digest,
    Sha256,
};
use std::collections::BTreeMap;

/// Append-only set of function and event signatures for one deployed
/// contract version.
#[derive(Clone, Debug)]
pub struct ContractAbi {
    name: &'static str,
    version: u32,
    functions: BTreeMap<String, FunctionSignature>,
    events: BTreeMap<String, EventSignature>,
}

impl ContractAbi {
    pub fn new(name: &'static str, version: u32) -> Self {
        Self {
            name,
            version,
            functions: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Adds a function. Registering an identical signature again is a no-op;
    /// changing an existing entry or colliding on a selector is rejected.
    pub fn register_function(&mut self, signature: FunctionSignature) -> Result<()> {
        if let Some(existing) = self.functions.get(signature.name()) {
            if *existing == signature {
                return Ok(());
            }
            return Err(AbiError::Registry(format!(
                "{} v{}: `{}` already registered as `{}`",
                self.name,
                self.version,
                signature.canonical(),
                existing.canonical()
            )));
        }
        if let Some(clash) = self
            .functions
            .values()
            .find(|f| f.selector() == signature.selector())
        {
            return Err(AbiError::Registry(format!(
                "{} v{}: selector {} of `{}` collides with `{}`",
                self.name,
                self.version,
                signature.selector(),
                signature.canonical(),
                clash.canonical()
            )));
        }
        self.functions
            .insert(signature.name().to_string(), signature);
        Ok(())
    }

    pub fn register_event(&mut self, signature: EventSignature) -> Result<()> {
        if let Some(existing) = self.events.get(signature.name()) {
            if *existing == signature {
                return Ok(());
            }
            return Err(AbiError::Registry(format!(
                "{} v{}: event `{}` already registered as `{}`",
                self.name,
                self.version,
                signature.canonical(),
                existing.canonical()
            )));
        }
        self.events.insert(signature.name().to_string(), signature);
        Ok(())
    }

    pub fn function(&self, name: &str) -> Result<&FunctionSignature> {
        self.functions.get(name).ok_or_else(|| {
            AbiError::Registry(format!(
                "{} v{} has no function `{name}`",
                self.name, self.version
            ))
        })
    }

    pub fn event(&self, name: &str) -> Result<&EventSignature> {
        self.events.get(name).ok_or_else(|| {
            AbiError::Registry(format!(
                "{} v{} has no event `{name}`",
                self.name, self.version
            ))
        })
    }

    pub fn event_by_topic(&self, topic: &B256) -> Option<&EventSignature> {
        self.events.values().find(|event| event.topic() == *topic)
    }

    pub fn function_by_selector(&self, selector: &[u8]) -> Option<&FunctionSignature> {
        self.functions
            .values()
            .find(|function| function.selector().as_slice() == selector)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.values()
    }

    pub fn selectors(&self) -> Vec<Selector> {
        self.functions.values().map(|f| f.selector()).collect()
    }

    /// Hex sha256 over every registered signature (sorted), return types and
    /// events included. Stored alongside a deployment so a client built
    /// against a different ABI refuses to talk to it.
    pub fn fingerprint(&self) -> String {
        let mut lines: Vec<String> = self
            .functions
            .values()
            .map(|f| {
                let payable = if f.is_payable() { " payable" } else { "" };
                format!("function {}{payable}", f.canonical_with_outputs())
            })
            .chain(
                self.events
                    .values()
                    .map(|e| format!("event {}", e.canonical())),
            )
            .collect();
        lines.sort();
        let mut hasher = Sha256::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    /// Fails when any selector this client would send is missing from the
    /// deployed contract's selector set.
    pub fn verify_selectors(&self, deployed: &[Selector]) -> Result<()> {
        let missing: Vec<&str> = self
            .functions
            .values()
            .filter(|f| !deployed.contains(&f.selector()))
            .map(|f| f.canonical())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AbiError::Registry(format!(
                "{} v{}: deployed contract lacks {}",
                self.name,
                self.version,
                missing.join(", ")
            )))
        }
    }
}
