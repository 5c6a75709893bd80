//! Hand-shaped schema sets covering the cases the seeder must handle.

use serde_json::{json, Value};

/// Protected `auth.users`, `public.posts` referencing it, and self-referencing
/// `public.comments` with a nested and an array reference.
///
/// Documents are listed parents first; tests that need a scrambled input
/// order reverse them.
pub fn blog() -> Vec<Value> {
    vec![
        json!({
            "title": "auth.users",
            "type": "object",
            "x-protected": true,
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "email": { "type": "string" }
            }
        }),
        json!({
            "title": "public.posts",
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "author_id": { "type": "string", "format": "uuid", "x-foreign-table": "auth.users" },
                "title": { "type": "string" },
                "status": { "type": "string", "enum": ["draft", "published", "archived"] },
                "published_at": { "type": "string", "format": "date-time" },
                "tags": { "type": "array", "items": { "type": "string" }, "x-count": 3 }
            }
        }),
        json!({
            "title": "public.comments",
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "post_id": { "type": "string", "x-foreign-table": "public.posts" },
                "parent_id": { "type": "string", "x-foreign-table": "public.comments" },
                "body": { "type": "string" },
                "meta": {
                    "type": "object",
                    "properties": {
                        "editor_id": { "type": "string", "x-foreign-table": "auth.users" },
                        "score": { "type": "number" }
                    }
                },
                "mentions": {
                    "type": "array",
                    "items": { "type": "string", "x-foreign-table": "auth.users" },
                    "x-count": 2
                }
            }
        }),
    ]
}

/// `len` tables where `t{i}` references `t{i-1}`, listed children first.
pub fn chain(len: usize) -> Vec<Value> {
    (0..len)
        .rev()
        .map(|i| {
            let mut properties = json!({
                "id": { "type": "string", "format": "uuid" },
                "label": { "type": "string" }
            });
            if i > 0 {
                properties["parent_id"] = json!({
                    "type": "string",
                    "x-foreign-table": format!("public.t{}", i - 1)
                });
            }
            json!({
                "title": format!("public.t{}", i),
                "type": "object",
                "properties": properties
            })
        })
        .collect()
}

/// `len` tables referencing each other in a ring: `c0 -> c1 -> ... -> c0`.
pub fn cycle(len: usize) -> Vec<Value> {
    (0..len)
        .map(|i| {
            json!({
                "title": format!("public.c{}", i),
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "next_id": {
                        "type": "integer",
                        "x-foreign-table": format!("public.c{}", (i + 1) % len)
                    }
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_lists_children_first() {
        let docs = chain(3);
        let titles: Vec<_> = docs.iter().map(|d| d["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["public.t2", "public.t1", "public.t0"]);
        assert!(docs[2]["properties"].get("parent_id").is_none());
    }

    #[test]
    fn test_cycle_closes_ring() {
        let docs = cycle(2);
        assert_eq!(docs[1]["properties"]["next_id"]["x-foreign-table"], "public.c0");
    }
}
