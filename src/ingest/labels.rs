use std::collections::BTreeMap;

use crate::ingest::error::{IngestError, Result};

/// 점으로 구분된 라벨 키를 접어 만든 트리입니다.
///
/// `traefik.http.routers.web.rule=Host(...)` 같은 키 집합은 고전적인
/// dotted-key → 중첩 맵 문제입니다. 접기는 여기서 한 번만 구현하고
/// compose 수집기가 재사용합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelNode {
    Leaf(String),
    Tree(BTreeMap<String, LabelNode>),
}

impl LabelNode {
    pub fn empty() -> Self {
        LabelNode::Tree(BTreeMap::new())
    }

    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            LabelNode::Leaf(value) => Some(value),
            LabelNode::Tree(_) => None,
        }
    }

    pub fn as_tree(&self) -> Option<&BTreeMap<String, LabelNode>> {
        match self {
            LabelNode::Tree(children) => Some(children),
            LabelNode::Leaf(_) => None,
        }
    }

    /// 점 경로로 하위 노드를 찾습니다.
    pub fn get(&self, path: &str) -> Option<&LabelNode> {
        let mut node = self;
        for segment in path.split('.') {
            node = node.as_tree()?.get(segment)?;
        }
        Some(node)
    }

    /// 점 경로의 리프 값을 찾습니다.
    pub fn leaf_at(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(LabelNode::as_leaf)
    }

    /// 트리 전체를 (경로, 값) 리프 목록으로 폅니다.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        match self {
            LabelNode::Leaf(value) => out.push((prefix.to_string(), value.clone())),
            LabelNode::Tree(children) => {
                for (key, child) in children {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    child.flatten_into(&path, out);
                }
            }
        }
    }
}

/// (키, 값) 쌍들을 점 단위로 쪼개 트리로 접습니다.
///
/// 같은 경로에 스칼라와 하위 트리가 동시에 오면 에러입니다:
/// `a.b=1`과 `a.b.c=2`는 공존할 수 없습니다.
pub fn fold_labels<'a, I>(pairs: I) -> Result<LabelNode>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut root = BTreeMap::new();

    for (key, value) in pairs {
        insert_path(&mut root, key, key, value)?;
    }

    Ok(LabelNode::Tree(root))
}

fn insert_path(
    tree: &mut BTreeMap<String, LabelNode>,
    full_key: &str,
    path: &str,
    value: &str,
) -> Result<()> {
    match path.split_once('.') {
        Some((head, rest)) => {
            let entry = tree
                .entry(head.to_string())
                .or_insert_with(LabelNode::empty);
            match entry {
                LabelNode::Tree(children) => insert_path(children, full_key, rest, value),
                LabelNode::Leaf(_) => {
                    // 리프가 이미 있는 자리에 하위 경로가 들어옴
                    let conflict_at = &full_key[..full_key.len() - rest.len() - 1];
                    Err(IngestError::LabelConflict {
                        path: conflict_at.to_string(),
                    })
                }
            }
        }
        None => match tree.get(path) {
            Some(LabelNode::Tree(_)) => Err(IngestError::LabelConflict {
                path: full_key.to_string(),
            }),
            _ => {
                tree.insert(path.to_string(), LabelNode::Leaf(value.to_string()));
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_nested_labels() {
        let tree = fold_labels(vec![
            ("traefik.enable", "true"),
            ("traefik.http.routers.web.rule", "Host(`x`)"),
            ("traefik.http.routers.web.service", "s"),
        ])
        .unwrap();

        assert_eq!(tree.leaf_at("traefik.enable"), Some("true"));
        assert_eq!(
            tree.leaf_at("traefik.http.routers.web.rule"),
            Some("Host(`x`)")
        );
        let routers = tree.get("traefik.http.routers").unwrap().as_tree().unwrap();
        assert_eq!(routers.len(), 1);
    }

    #[test]
    fn test_scalar_tree_conflict() {
        // 스칼라 다음에 하위 트리
        let err = fold_labels(vec![("a.b", "1"), ("a.b.c", "2")]).unwrap_err();
        assert!(matches!(err, IngestError::LabelConflict { path } if path == "a.b"));

        // 하위 트리 다음에 스칼라
        let err = fold_labels(vec![("a.b.c", "2"), ("a.b", "1")]).unwrap_err();
        assert!(matches!(err, IngestError::LabelConflict { path } if path == "a.b"));
    }

    #[test]
    fn test_flatten_roundtrip() {
        let pairs = vec![
            ("traefik.enable", "true"),
            ("traefik.http.routers.web.rule", "Host(`x`)"),
        ];
        let tree = fold_labels(pairs.clone()).unwrap();
        let mut flat = tree.flatten();
        flat.sort();
        assert_eq!(
            flat,
            vec![
                ("traefik.enable".to_string(), "true".to_string()),
                (
                    "traefik.http.routers.web.rule".to_string(),
                    "Host(`x`)".to_string()
                ),
            ]
        );
    }
}
