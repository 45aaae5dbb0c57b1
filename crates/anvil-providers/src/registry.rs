//! Registers providers, boots them in dependency order, and runs shutdown
//! hooks in reverse boot order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anvil_core::{Error, Result};
use anvil_di::Container;
use anvil_signals::EventBus;

use crate::events::{ProviderBooted, ProviderRegistered, ProviderShutDown};
use crate::provider::Provider;

/// Holds the provider list across its `register -> boot -> shutdown`
/// lifecycle. `Engine::build` calls [`ProviderRegistry::register_all`] then
/// [`ProviderRegistry::boot_all`]; `Engine::close` calls
/// [`ProviderRegistry::shutdown_all`].
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
    /// Names in the order they actually booted, so shutdown can run the
    /// exact reverse regardless of how `requires()` ties were broken.
    boot_order: Vec<usize>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, provider: Arc<dyn Provider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    /// Calls `register` on every provider in registration order. Pure
    /// bindings only — no ordering constraint applies here.
    pub async fn register_all(&self, container: &Container, events: &EventBus) -> Result<()> {
        for provider in &self.providers {
            provider.register(container).await?;
            events.publish(ProviderRegistered { name: provider.name() }).await;
        }
        Ok(())
    }

    /// Topologically sorts providers by `requires()` and calls `boot` on
    /// each in that order. Returns [`Error::CyclicProviders`] naming the
    /// unresolvable chain if the dependency graph has a cycle.
    pub async fn boot_all(&mut self, container: &Container, events: &EventBus) -> Result<()> {
        let order = topological_order(&self.providers)?;
        for &index in &order {
            let provider = &self.providers[index];
            provider.boot(container).await?;
            events.publish(ProviderBooted { name: provider.name() }).await;
        }
        self.boot_order = order;
        Ok(())
    }

    /// Runs `shutdown` in the exact reverse of the order providers actually
    /// booted in.
    pub async fn shutdown_all(&self, container: &Container, events: &EventBus) {
        for &index in self.boot_order.iter().rev() {
            let provider = &self.providers[index];
            if let Err(err) = provider.shutdown(container).await {
                tracing::error!(provider = provider.name(), error = %err, "provider shutdown failed");
            }
            events.publish(ProviderShutDown { name: provider.name() }).await;
        }
    }
}

/// Kahn's algorithm over provider names. `requires()` entries that don't
/// name a registered provider are ignored (an external/implicit
/// dependency, not part of this graph).
fn topological_order(providers: &[Arc<dyn Provider>]) -> Result<Vec<usize>> {
    let index_of: HashMap<&'static str, usize> =
        providers.iter().enumerate().map(|(i, p)| (p.name(), i)).collect();

    let mut in_degree = vec![0usize; providers.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); providers.len()];

    for (i, provider) in providers.iter().enumerate() {
        for dep_name in provider.requires() {
            if let Some(&dep_index) = index_of.get(dep_name) {
                dependents[dep_index].push(i);
                in_degree[i] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> =
        in_degree.iter().enumerate().filter(|(_, &d)| d == 0).map(|(i, _)| i).collect();
    let mut order = Vec::with_capacity(providers.len());

    while let Some(index) = queue.pop_front() {
        order.push(index);
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if order.len() != providers.len() {
        let remaining: Vec<String> = (0..providers.len())
            .filter(|i| !order.contains(i))
            .map(|i| providers[i].name().to_string())
            .collect();
        return Err(Error::CyclicProviders(remaining));
    }

    Ok(order)
}
