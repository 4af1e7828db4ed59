//! Dependency graph construction, validation, and topological ordering.

use std::collections::HashMap;

use crate::definition::{AdHocCtor, ProviderDefinition};
use crate::error::{DiError, DiResult};
use crate::tier::Tier;
use crate::token::Token;

/// Validated provider table: the definitions plus the per-tier topological
/// build orders distilled from the local dependency graph.
pub(crate) struct ProviderTable {
    pub(crate) definitions: HashMap<Token, ProviderDefinition>,
    /// Tokens in first-registration order; the tie-breaker that keeps builds
    /// reproducible.
    pub(crate) declaration: Vec<Token>,
    pub(crate) global_order: Vec<Token>,
    pub(crate) session_order: Vec<Token>,
    pub(crate) request_order: Vec<Token>,
}

impl ProviderTable {
    /// Registers an externally-built global value after bootstrap. Overwrites
    /// any earlier definition for the token and clears its edges.
    pub(crate) fn register_injected(&mut self, definition: ProviderDefinition) {
        let token = definition.token.clone();
        if !self.definitions.contains_key(&token) {
            self.declaration.push(token.clone());
        }
        self.definitions.insert(token.clone(), definition);
        self.session_order.retain(|t| t != &token);
        self.request_order.retain(|t| t != &token);
        if !self.global_order.contains(&token) {
            self.global_order.push(token);
        }
    }
}

/// Builds and validates the provider table for one definition list.
///
/// For each declared dependency: local definitions produce an edge; ancestor
/// definitions and ad hoc grants are accepted without one; anything else is
/// an [`DiError::UnregisteredDependency`]. Global definitions may only depend
/// on global tokens, wherever those live in the hierarchy.
pub(crate) fn build_table(
    definitions: Vec<ProviderDefinition>,
    ad_hoc: &HashMap<Token, AdHocCtor>,
    ancestor_tier: &dyn Fn(&Token) -> Option<Tier>,
    ancestor_ad_hoc: &dyn Fn(&Token) -> bool,
) -> DiResult<ProviderTable> {
    let mut declaration = Vec::with_capacity(definitions.len());
    let mut map: HashMap<Token, ProviderDefinition> = HashMap::with_capacity(definitions.len());
    for definition in definitions {
        declaration.push(definition.token.clone());
        map.insert(definition.token.clone(), definition);
    }

    let mut edges: HashMap<Token, Vec<Token>> = HashMap::with_capacity(map.len());
    for token in &declaration {
        let definition = &map[token];
        let mut local = Vec::new();
        for dependency in &definition.dependencies {
            let dependency_tier = if let Some(dep) = map.get(dependency) {
                local.push(dependency.clone());
                Some(dep.tier)
            } else if let Some(tier) = ancestor_tier(dependency) {
                Some(tier)
            } else if ad_hoc.contains_key(dependency) || ancestor_ad_hoc(dependency) {
                // Satisfied by the explicit fallback table; built with no
                // injected dependencies, so no edge and no tier to check.
                None
            } else {
                return Err(DiError::UnregisteredDependency {
                    token: token.display_name(),
                    dependency: dependency.display_name(),
                });
            };
            if definition.tier == Tier::Global {
                if let Some(tier) = dependency_tier {
                    if tier != Tier::Global {
                        return Err(DiError::ScopeViolation {
                            token: token.display_name(),
                            dependency: dependency.display_name(),
                            dependency_tier: tier,
                        });
                    }
                }
            }
        }
        edges.insert(token.clone(), local);
    }

    let order = topological_order(&declaration, &edges)?;
    let mut global_order = Vec::new();
    let mut session_order = Vec::new();
    let mut request_order = Vec::new();
    for token in order {
        match map[&token].tier {
            Tier::Global => global_order.push(token),
            Tier::Session => session_order.push(token),
            Tier::Request => request_order.push(token),
        }
    }

    Ok(ProviderTable {
        definitions: map,
        declaration,
        global_order,
        session_order,
        request_order,
    })
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first postorder over the local graph: dependencies emitted before
/// their dependents, siblings in declaration order. A re-encountered
/// in-progress node is a cycle; the path is reconstructed from the DFS stack.
fn topological_order(
    declaration: &[Token],
    edges: &HashMap<Token, Vec<Token>>,
) -> DiResult<Vec<Token>> {
    let mut marks: HashMap<Token, Mark> = HashMap::with_capacity(declaration.len());
    let mut stack: Vec<Token> = Vec::new();
    let mut order: Vec<Token> = Vec::with_capacity(declaration.len());

    for token in declaration {
        visit(token, edges, &mut marks, &mut stack, &mut order)?;
    }
    Ok(order)
}

fn visit(
    token: &Token,
    edges: &HashMap<Token, Vec<Token>>,
    marks: &mut HashMap<Token, Mark>,
    stack: &mut Vec<Token>,
    order: &mut Vec<Token>,
) -> DiResult<()> {
    match marks.get(token).copied().unwrap_or(Mark::Unvisited) {
        Mark::Done => return Ok(()),
        Mark::InProgress => {
            let start = stack.iter().position(|t| t == token).unwrap_or(0);
            let mut path: Vec<&'static str> =
                stack[start..].iter().map(Token::display_name).collect();
            path.push(token.display_name());
            return Err(DiError::Cycle(path));
        }
        Mark::Unvisited => {}
    }

    marks.insert(token.clone(), Mark::InProgress);
    stack.push(token.clone());
    if let Some(dependencies) = edges.get(token) {
        for dependency in dependencies {
            visit(dependency, edges, marks, stack, order)?;
        }
    }
    stack.pop();
    marks.insert(token.clone(), Mark::Done);
    order.push(token.clone());
    Ok(())
}
