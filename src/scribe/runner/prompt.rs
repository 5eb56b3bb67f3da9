// SPDX-License-Identifier: MIT

//! Prompt assembly - resolve block lists into final prompt strings

use super::cache::OutputCache;
use crate::scribe::agent::AgentContext;
use crate::scribe::workflow::types::{Block, NodeDefinition, TextBlockList};

/// Resolve every block in list order and join them with newlines.
///
/// A reference whose source has no cached output is replaced by a visible
/// `[Unresolved: <label>]` placeholder instead of failing.
pub fn resolve_list(list: &TextBlockList, cache: &OutputCache) -> String {
    list.blocks
        .iter()
        .map(|block| match block {
            Block::Text(text) => text.content.clone(),
            Block::Virtual(reference) => match cache.get(&reference.source_node_id) {
                Some(output) => output.to_string(),
                None => {
                    log::warn!("Unresolved reference to node {}", reference.source_node_id);
                    format!("[Unresolved: {}]", reference.label())
                }
            },
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the `(system, user)` prompt pair for a node
pub fn build_prompt(
    node: &NodeDefinition,
    cache: &OutputCache,
    context: Option<&AgentContext>,
) -> (String, String) {
    let mut system = resolve_list(&node.system_prompt, cache);
    let mut user = resolve_list(&node.user_prompt, cache);

    if let Some(ctx) = context {
        if !ctx.system_prefix.is_empty() {
            system = if system.is_empty() {
                ctx.system_prefix.clone()
            } else {
                format!("{}\n{}", ctx.system_prefix, system)
            };
        }
        if !ctx.user_suffix.is_empty() {
            user = if user.is_empty() {
                ctx.user_suffix.clone()
            } else {
                format!("{}\n{}", user, ctx.user_suffix)
            };
        }
    }

    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(entries: &[(&str, &str)]) -> OutputCache {
        let mut cache = OutputCache::new();
        for (id, text) in entries {
            cache.set(id, text.to_string());
        }
        cache
    }

    #[test]
    fn test_blocks_joined_with_newline() {
        let list = TextBlockList::new(vec![Block::text("Hello "), Block::reference("n1")]);
        let cache = cache_with(&[("n1", "world")]);
        assert_eq!(resolve_list(&list, &cache), "Hello \nworld");
    }

    #[test]
    fn test_empty_list_resolves_to_empty_string() {
        assert_eq!(resolve_list(&TextBlockList::default(), &OutputCache::new()), "");
    }

    #[test]
    fn test_unresolved_placeholder_uses_label() {
        let list = TextBlockList::new(vec![
            Block::named_reference("n1", "Outline"),
            Block::reference("n2"),
        ]);
        assert_eq!(
            resolve_list(&list, &OutputCache::new()),
            "[Unresolved: Outline]\n[Unresolved: n2]"
        );
    }

    #[test]
    fn test_same_reference_twice_repeats_output() {
        let list = TextBlockList::new(vec![Block::reference("n1"), Block::reference("n1")]);
        let cache = cache_with(&[("n1", "x")]);
        assert_eq!(resolve_list(&list, &cache), "x\nx");
    }

    #[test]
    fn test_build_prompt_without_context() {
        let node = NodeDefinition::new("b", "B")
            .with_system(vec![Block::text("You edit.")])
            .with_user(vec![Block::reference("a"), Block::text("Tighten this.")]);
        let cache = cache_with(&[("a", "draft")]);

        let (system, user) = build_prompt(&node, &cache, None);
        assert_eq!(system, "You edit.");
        assert_eq!(user, "draft\nTighten this.");
    }

    #[test]
    fn test_build_prompt_with_context() {
        let node = NodeDefinition::new("b", "B")
            .with_system(vec![Block::text("You edit.")])
            .with_user(vec![Block::text("Go.")]);
        let ctx = AgentContext {
            system_prefix: "PREFIX".to_string(),
            user_suffix: "SUFFIX".to_string(),
            sources: vec![],
        };

        let (system, user) = build_prompt(&node, &OutputCache::new(), Some(&ctx));
        assert_eq!(system, "PREFIX\nYou edit.");
        assert_eq!(user, "Go.\nSUFFIX");
    }

    #[test]
    fn test_context_on_empty_prompts_adds_no_separator() {
        let node = NodeDefinition::new("a", "A");
        let ctx = AgentContext {
            system_prefix: "PREFIX".to_string(),
            user_suffix: "SUFFIX".to_string(),
            sources: vec![],
        };

        let (system, user) = build_prompt(&node, &OutputCache::new(), Some(&ctx));
        assert_eq!(system, "PREFIX");
        assert_eq!(user, "SUFFIX");
    }

    #[test]
    fn test_empty_context_leaves_prompts_unchanged() {
        let node = NodeDefinition::new("a", "A").with_user(vec![Block::text("Go.")]);
        let empty = AgentContext::default();
        let (system, user) = build_prompt(&node, &OutputCache::new(), Some(&empty));
        assert_eq!(system, "");
        assert_eq!(user, "Go.");
    }
}
