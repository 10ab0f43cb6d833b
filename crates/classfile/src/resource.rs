//! The asset resource index: `spx://resources/...` identities,
//! `ResourceSet`, and the `<root>/index.json` + per-sprite/per-sound
//! manifest parser.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use spxls_core::{Error, Result};

/// The canonical identity of one asset. Every variant round-trips
/// through [`ResourceId::uri`] / [`ResourceId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Backdrop { name: String },
    Sprite { name: String },
    SpriteCostume { sprite: String, costume: String },
    SpriteAnimation { sprite: String, animation: String },
    Sound { name: String },
    Widget { name: String },
}

impl ResourceId {
    /// The canonical `spx://resources/...` URI for this resource.
    pub fn uri(&self) -> String {
        match self {
            ResourceId::Backdrop { name } => format!("spx://resources/backdrops/{name}"),
            ResourceId::Sprite { name } => format!("spx://resources/sprites/{name}"),
            ResourceId::SpriteCostume { sprite, costume } => {
                format!("spx://resources/sprites/{sprite}/costumes/{costume}")
            }
            ResourceId::SpriteAnimation { sprite, animation } => {
                format!("spx://resources/sprites/{sprite}/animations/{animation}")
            }
            ResourceId::Sound { name } => format!("spx://resources/sounds/{name}"),
            ResourceId::Widget { name } => format!("spx://resources/widgets/{name}"),
        }
    }

    /// The URI of the enclosing context a reference to this resource is
    /// scoped within (a sprite's own costumes/animations are only valid
    /// references from within that sprite).
    pub fn context_uri(&self) -> String {
        match self {
            ResourceId::Backdrop { .. } => "spx://resources/backdrops".to_string(),
            ResourceId::Sprite { name } => format!("spx://resources/sprites/{name}"),
            ResourceId::SpriteCostume { sprite, .. } => {
                format!("spx://resources/sprites/{sprite}/costumes")
            }
            ResourceId::SpriteAnimation { sprite, .. } => {
                format!("spx://resources/sprites/{sprite}/animations")
            }
            ResourceId::Sound { .. } => "spx://resources/sounds".to_string(),
            ResourceId::Widget { .. } => "spx://resources/widgets".to_string(),
        }
    }

    /// Parse a canonical URI back into a [`ResourceId`], rejecting any
    /// scheme, host, or segment shape it would not itself produce.
    pub fn parse(uri: &str) -> Result<ResourceId> {
        let rest = uri
            .strip_prefix("spx://")
            .ok_or_else(|| Error::ReferenceDiagnostic {
                message: format!("unsupported scheme in resource uri: {uri}"),
            })?;
        let mut segments = rest.split('/');
        let host = segments.next().unwrap_or("");
        if host != "resources" {
            return Err(Error::ReferenceDiagnostic {
                message: format!("unsupported host in resource uri: {uri}"),
            });
        }

        let kind = non_empty(segments.next(), uri)?;
        let id = match kind {
            "backdrops" => {
                let name = non_empty(segments.next(), uri)?.to_string();
                ResourceId::Backdrop { name }
            }
            "sprites" => {
                let sprite = non_empty(segments.next(), uri)?.to_string();
                match segments.next() {
                    None => ResourceId::Sprite { name: sprite },
                    Some("costumes") => {
                        let costume = non_empty(segments.next(), uri)?.to_string();
                        ResourceId::SpriteCostume { sprite, costume }
                    }
                    Some("animations") => {
                        let animation = non_empty(segments.next(), uri)?.to_string();
                        ResourceId::SpriteAnimation { sprite, animation }
                    }
                    Some(other) => {
                        return Err(Error::ReferenceDiagnostic {
                            message: format!("unrecognized segment {other:?} in resource uri: {uri}"),
                        })
                    }
                }
            }
            "sounds" => {
                let name = non_empty(segments.next(), uri)?.to_string();
                ResourceId::Sound { name }
            }
            "widgets" => {
                let name = non_empty(segments.next(), uri)?.to_string();
                ResourceId::Widget { name }
            }
            other => {
                return Err(Error::ReferenceDiagnostic {
                    message: format!("unrecognized resource kind {other:?} in uri: {uri}"),
                })
            }
        };

        if segments.next().is_some() {
            return Err(Error::ReferenceDiagnostic {
                message: format!("trailing segments in resource uri: {uri}"),
            });
        }
        Ok(id)
    }
}

fn non_empty<'a>(segment: Option<&'a str>, uri: &str) -> Result<&'a str> {
    match segment {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(Error::ReferenceDiagnostic {
            message: format!("missing resource name in uri: {uri}"),
        }),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Backdrop {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sound {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Widget {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Costume {
    pub name: String,
}

/// A frame-range animation, resolved against the sprite's ordered
/// costume list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Animation {
    pub name: String,
    pub from_index: Option<usize>,
    pub to_index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sprite {
    pub name: String,
    /// In manifest (z-) order.
    pub costumes: Vec<Costume>,
    pub animations: Vec<Animation>,
    /// Costume names not covered by any animation's `[from, to]` span.
    /// This set and the union of animation spans partition `costumes`.
    pub normal_costumes: Vec<String>,
}

impl Sprite {
    pub fn costume(&self, name: &str) -> Option<&Costume> {
        self.costumes.iter().find(|c| c.name == name)
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }
}

/// The fully parsed asset tree for a project.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    pub backdrops: HashMap<String, Backdrop>,
    pub sprites: HashMap<String, Sprite>,
    pub sounds: HashMap<String, Sound>,
    pub widgets: HashMap<String, Widget>,
}

impl ResourceSet {
    pub fn backdrop(&self, name: &str) -> Option<&Backdrop> {
        self.backdrops.get(name)
    }

    pub fn sprite(&self, name: &str) -> Option<&Sprite> {
        self.sprites.get(name)
    }

    pub fn sound(&self, name: &str) -> Option<&Sound> {
        self.sounds.get(name)
    }

    pub fn widget(&self, name: &str) -> Option<&Widget> {
        self.widgets.get(name)
    }

    /// Resolve a [`ResourceId`] against this set, confirming it names an
    /// asset that actually exists.
    pub fn resolve(&self, id: &ResourceId) -> bool {
        match id {
            ResourceId::Backdrop { name } => self.backdrops.contains_key(name),
            ResourceId::Sprite { name } => self.sprites.contains_key(name),
            ResourceId::SpriteCostume { sprite, costume } => self
                .sprites
                .get(sprite)
                .map(|s| s.costume(costume).is_some())
                .unwrap_or(false),
            ResourceId::SpriteAnimation { sprite, animation } => self
                .sprites
                .get(sprite)
                .map(|s| s.animation(animation).is_some())
                .unwrap_or(false),
            ResourceId::Sound { name } => self.sounds.contains_key(name),
            ResourceId::Widget { name } => self.widgets.contains_key(name),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RootManifest {
    #[serde(default)]
    backdrops: Vec<BackdropRecord>,
    #[serde(default)]
    zorder: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct BackdropRecord {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct SpriteManifest {
    #[serde(default)]
    costumes: Vec<CostumeRecord>,
    #[serde(default, rename = "fAnimations")]
    f_animations: HashMap<String, FrameAnimationRecord>,
}

#[derive(Debug, Deserialize)]
struct CostumeRecord {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct FrameAnimationRecord {
    #[serde(rename = "frameFrom")]
    frame_from: Option<String>,
    #[serde(rename = "frameTo")]
    frame_to: Option<String>,
}

/// Parse `<root>/index.json` plus every `sounds/*/index.json` and
/// `sprites/*/index.json` manifest underneath it. A missing or
/// malformed manifest anywhere in the tree fails the whole build: the
/// index is all-or-nothing, unlike per-file AST parsing.
pub fn build_resource_index(root: &Path) -> Result<ResourceSet> {
    let mut set = ResourceSet::default();

    let root_manifest: RootManifest = read_json(&root.join("index.json"))?;
    for record in root_manifest.backdrops {
        set.backdrops.insert(
            record.name.clone(),
            Backdrop { name: record.name },
        );
    }
    for entry in root_manifest.zorder {
        if let Some(name) = entry.get("name").and_then(|v| v.as_str()) {
            set.widgets
                .insert(name.to_string(), Widget { name: name.to_string() });
        }
    }

    let sounds_dir = root.join("sounds");
    if sounds_dir.is_dir() {
        for dir in read_subdirs(&sounds_dir)? {
            let name = dir_name(&dir);
            let _: serde_json::Value = read_json(&dir.join("index.json"))?;
            set.sounds.insert(name.clone(), Sound { name });
        }
    }

    let sprites_dir = root.join("sprites");
    if sprites_dir.is_dir() {
        for dir in read_subdirs(&sprites_dir)? {
            let name = dir_name(&dir);
            let manifest: SpriteManifest = read_json(&dir.join("index.json"))?;
            let sprite = build_sprite(name, manifest);
            set.sprites.insert(sprite.name.clone(), sprite);
        }
    }

    Ok(set)
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&text).map_err(|e| Error::ResourceIndexError {
        message: format!("{}: {e}", path.display()),
    })?;
    Ok(value)
}

fn read_subdirs(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();
    Ok(entries)
}

fn build_sprite(name: String, manifest: SpriteManifest) -> Sprite {
    let costumes: Vec<Costume> = manifest
        .costumes
        .into_iter()
        .map(|c| Costume { name: c.name })
        .collect();
    let position_of = |cname: &str| costumes.iter().position(|c| c.name == cname);

    let mut covered = vec![false; costumes.len()];
    let mut names: Vec<&String> = manifest.f_animations.keys().collect();
    names.sort();

    let mut animations = Vec::with_capacity(names.len());
    for anim_name in names {
        let record = &manifest.f_animations[anim_name];
        let from_index = record.frame_from.as_deref().and_then(position_of);
        let to_index = record.frame_to.as_deref().and_then(position_of);
        if let (Some(from), Some(to)) = (from_index, to_index) {
            if from <= to {
                for slot in covered.iter_mut().take(to + 1).skip(from) {
                    *slot = true;
                }
            }
        }
        animations.push(Animation {
            name: anim_name.clone(),
            from_index,
            to_index,
        });
    }

    let normal_costumes = costumes
        .iter()
        .zip(covered.iter())
        .filter(|(_, covered)| !**covered)
        .map(|(c, _)| c.name.clone())
        .collect();

    Sprite {
        name,
        costumes,
        animations,
        normal_costumes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn uri_round_trips_every_variant() {
        let ids = [
            ResourceId::Backdrop { name: "Bg1".into() },
            ResourceId::Sprite { name: "Hero".into() },
            ResourceId::SpriteCostume {
                sprite: "Hero".into(),
                costume: "Idle1".into(),
            },
            ResourceId::SpriteAnimation {
                sprite: "Hero".into(),
                animation: "run".into(),
            },
            ResourceId::Sound { name: "boom".into() },
            ResourceId::Widget { name: "ScoreLabel".into() },
        ];
        for id in ids {
            let uri = id.uri();
            let parsed = ResourceId::parse(&uri).unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn parse_rejects_unknown_scheme_and_host() {
        assert!(ResourceId::parse("http://resources/sprites/Hero").is_err());
        assert!(ResourceId::parse("spx://assets/sprites/Hero").is_err());
        assert!(ResourceId::parse("spx://resources/sprites/").is_err());
        assert!(ResourceId::parse("spx://resources/sprites/Hero/costumes/A/extra").is_err());
        assert!(ResourceId::parse("spx://resources/planets/Mars").is_err());
    }

    #[test]
    fn animation_partition_covers_every_costume_exactly_once() {
        let manifest = SpriteManifest {
            costumes: vec![
                CostumeRecord { name: "a".into() },
                CostumeRecord { name: "b".into() },
                CostumeRecord { name: "c".into() },
                CostumeRecord { name: "d".into() },
            ],
            f_animations: HashMap::from([(
                "run".to_string(),
                FrameAnimationRecord {
                    frame_from: Some("b".into()),
                    frame_to: Some("c".into()),
                },
            )]),
        };
        let sprite = build_sprite("Hero".into(), manifest);
        assert_eq!(sprite.normal_costumes, vec!["a".to_string(), "d".to_string()]);
        assert_eq!(sprite.animations[0].from_index, Some(1));
        assert_eq!(sprite.animations[0].to_index, Some(2));
    }

    #[test]
    fn build_resource_index_reads_manifests_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("index.json"),
            r#"{"backdrops":[{"name":"Bg1"}],"zorder":[{"name":"Score"},{"no_name":true}]}"#,
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("sprites/Hero")).unwrap();
        fs::write(
            dir.path().join("sprites/Hero/index.json"),
            r#"{"costumes":[{"name":"Idle1"},{"name":"Idle2"}],"fAnimations":{}}"#,
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("sounds/boom")).unwrap();
        fs::write(dir.path().join("sounds/boom/index.json"), r#"{}"#).unwrap();

        let set = build_resource_index(dir.path()).unwrap();
        assert!(set.backdrop("Bg1").is_some());
        assert!(set.widget("Score").is_some());
        assert!(set.widget("no_name").is_none());
        assert_eq!(set.sprite("Hero").unwrap().costumes.len(), 2);
        assert!(set.sound("boom").is_some());
    }

    #[test]
    fn missing_root_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_resource_index(dir.path()).unwrap_err();
        assert!(err.is_diagnostic());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9_]{0,15}"
    }

    proptest! {
        // Every resource id's uri parses back to itself.
        #[test]
        fn backdrop_uri_round_trips(name in name()) {
            let id = ResourceId::Backdrop { name };
            prop_assert_eq!(ResourceId::parse(&id.uri()).unwrap(), id);
        }

        #[test]
        fn sprite_uri_round_trips(name in name()) {
            let id = ResourceId::Sprite { name };
            prop_assert_eq!(ResourceId::parse(&id.uri()).unwrap(), id);
        }

        #[test]
        fn sprite_costume_uri_round_trips(sprite in name(), costume in name()) {
            let id = ResourceId::SpriteCostume { sprite, costume };
            prop_assert_eq!(ResourceId::parse(&id.uri()).unwrap(), id);
        }

        #[test]
        fn sprite_animation_uri_round_trips(sprite in name(), animation in name()) {
            let id = ResourceId::SpriteAnimation { sprite, animation };
            prop_assert_eq!(ResourceId::parse(&id.uri()).unwrap(), id);
        }

        #[test]
        fn sound_uri_round_trips(name in name()) {
            let id = ResourceId::Sound { name };
            prop_assert_eq!(ResourceId::parse(&id.uri()).unwrap(), id);
        }

        #[test]
        fn widget_uri_round_trips(name in name()) {
            let id = ResourceId::Widget { name };
            prop_assert_eq!(ResourceId::parse(&id.uri()).unwrap(), id);
        }

        // Every costume lands in exactly one of `normal_costumes` or
        // some animation's [from, to] interval, for any ordered costume
        // list and any single randomly-placed span.
        #[test]
        fn animation_partition_holds_for_arbitrary_spans(
            count in 1usize..12,
            from in 0usize..12,
            to in 0usize..12,
        ) {
            let costumes: Vec<CostumeRecord> = (0..count)
                .map(|i| CostumeRecord { name: format!("c{i}") })
                .collect();
            let names: Vec<String> = costumes.iter().map(|c| c.name.clone()).collect();
            let from = from.min(count.saturating_sub(1));
            let to = to.min(count.saturating_sub(1));

            let manifest = SpriteManifest {
                costumes,
                f_animations: HashMap::from([(
                    "anim".to_string(),
                    FrameAnimationRecord {
                        frame_from: Some(names[from].clone()),
                        frame_to: Some(names[to].clone()),
                    },
                )]),
            };
            let sprite = build_sprite("S".into(), manifest);

            for (index, cname) in names.iter().enumerate() {
                let in_normal = sprite.normal_costumes.contains(cname);
                let in_animation = from <= to && index >= from && index <= to;
                prop_assert_ne!(in_normal, in_animation);
            }
        }
    }
}
