use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Deserializer};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::input::{MAX_FRAME_SIDE, frame_size_ok};
use crate::landmark::PoseLandmark;
use crate::trainer::RepThresholds;

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Frame size assumed when the feed does not report one.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    pub curl_down_deg: f32,
    pub curl_up_deg: f32,
    pub ink_darkness: u8,
}

impl Thresholds {
    pub fn rep(&self) -> RepThresholds {
        RepThresholds {
            down_above_deg: self.curl_down_deg,
            up_below_deg: self.curl_up_deg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tool {
    pub name: String,
    // Accept either [r, g, b] or "#rrggbb"
    #[serde(deserialize_with = "deserialize_color")]
    pub color: [u8; 3],
    #[serde(default)]
    pub eraser: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Painter {
    pub header_height: u32,
    pub brush_width: u32,
    pub eraser_width: u32,
    pub palette: Vec<Tool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trainer {
    pub shoulder: usize,
    pub elbow: usize,
    pub wrist: usize,
}

impl Default for Trainer {
    fn default() -> Self {
        Self {
            shoulder: PoseLandmark::RightShoulder.id(),
            elbow: PoseLandmark::RightElbow.id(),
            wrist: PoseLandmark::RightWrist.id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub frame: FrameSize,
    pub thresholds: Thresholds,
    pub painter: Painter,
    #[serde(default)]
    pub trainer: Trainer,
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn builtin() -> Result<Self> {
        Self::parse(default_profile_text())
    }
}

// --------- color deserializer (tolerant) ----------
fn deserialize_color<'de, D>(de: D) -> std::result::Result<[u8; 3], D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    color_from_value(&val).map_err(serde::de::Error::custom)
}

fn color_from_value(val: &toml::Value) -> std::result::Result<[u8; 3], String> {
    match val {
        toml::Value::String(s) => parse_hex_color(s),
        toml::Value::Array(items) => {
            if items.len() != 3 {
                return Err(format!("color must have 3 channels, got {}", items.len()));
            }
            let mut out = [0u8; 3];
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = item
                    .as_integer()
                    .and_then(|c| u8::try_from(c).ok())
                    .ok_or_else(|| format!("color channel must be 0..=255, got {item}"))?;
            }
            Ok(out)
        }
        other => Err(format!(
            "color must be [r, g, b] or \"#rrggbb\", got {}",
            other.type_str()
        )),
    }
}

fn parse_hex_color(s: &str) -> std::result::Result<[u8; 3], String> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(format!("invalid hex color '{s}'"));
    }
    let mut out = [0u8; 3];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| format!("invalid hex color '{s}'"))?;
    }
    Ok(out)
}
// ------------------------------------------------------------

/// Named profiles on disk plus the pointer to the active one.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub active_name: String,
    pub profile: Profile,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("could not determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("fingerctl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ProfileStore {
    pub fn load_or_install_default() -> Result<Self> {
        Self::open_at(config_dir()?)
    }

    /// Opens (and seeds, if needed) a store rooted at `cfgdir`.
    pub fn open_at(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    /// Loads a profile by name without switching to it.
    pub fn load(&self, name: &str) -> Result<Profile> {
        load_profile(&self.profiles_dir, name)
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }
}

/// Profile names are bare file stems inside the profiles directory.
fn check_profile_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(anyhow!("invalid profile name '{name}'"));
    }
    Ok(())
}

fn load_profile(profdir: &Path, name: &str) -> Result<Profile> {
    check_profile_name(name)?;
    let path = profdir.join(format!("{name}.toml"));
    if !path.exists() {
        return Err(anyhow!("profile not found: {}", path.display()));
    }
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::parse(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn validate_profile(p: &Profile) -> Result<()> {
    if !frame_size_ok(p.frame.width, p.frame.height) {
        return Err(anyhow!("frame width and height must be within 1..={MAX_FRAME_SIDE}"));
    }

    let th = &p.thresholds;
    for (key, deg) in [("curl_down_deg", th.curl_down_deg), ("curl_up_deg", th.curl_up_deg)] {
        if !(0.0..=180.0).contains(&deg) {
            return Err(anyhow!("thresholds.{key} must be within [0, 180] degrees"));
        }
    }
    if th.curl_up_deg >= th.curl_down_deg {
        return Err(anyhow!(
            "thresholds.curl_up_deg must be below thresholds.curl_down_deg"
        ));
    }

    let painter = &p.painter;
    if painter.palette.is_empty() {
        return Err(anyhow!("painter.palette must contain at least one tool"));
    }
    for tool in &painter.palette {
        if tool.name.trim().is_empty() {
            return Err(anyhow!("painter.palette entry has an empty name"));
        }
    }
    if painter.header_height > p.frame.height {
        return Err(anyhow!("painter.header_height exceeds frame height"));
    }
    if painter.brush_width == 0 || painter.eraser_width == 0 {
        return Err(anyhow!("brush and eraser widths must be positive"));
    }
    if painter.eraser_width < painter.brush_width {
        warn!(
            "eraser_width ({}) is narrower than brush_width ({})",
            painter.eraser_width, painter.brush_width
        );
    }

    let t = &p.trainer;
    for (key, id) in [("shoulder", t.shoulder), ("elbow", t.elbow), ("wrist", t.wrist)] {
        if id >= PoseLandmark::COUNT {
            return Err(anyhow!(
                "trainer.{key} = {id} is not a pose landmark (0..{})",
                PoseLandmark::COUNT
            ));
        }
    }
    if t.shoulder == t.elbow || t.elbow == t.wrist || t.shoulder == t.wrist {
        return Err(anyhow!("trainer joints must be three distinct landmarks"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fingerctl-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn builtin_profile_is_valid() {
        let p = Profile::builtin().unwrap();
        assert_eq!(p.meta.name.as_deref(), Some("default"));
        assert_eq!((p.frame.width, p.frame.height), (1280, 720));
        assert_eq!(p.painter.palette.len(), 4);
        assert_eq!(p.painter.palette[1].color, [0, 0, 255]);
        assert!(p.painter.palette[3].eraser);
        assert!(!p.painter.palette[0].eraser);
        assert_eq!(p.trainer.elbow, 14);
        assert_eq!(p.thresholds.rep().down_above_deg, 160.0);
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#ff8000"), Ok([255, 128, 0]));
        assert_eq!(parse_hex_color("00FF00"), Ok([0, 255, 0]));
        assert!(parse_hex_color("#fff").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
    }

    fn color_value(src: &str) -> toml::Value {
        let mut table: toml::Table = toml::from_str(&format!("c = {src}")).unwrap();
        table.remove("c").unwrap()
    }

    #[test]
    fn array_colors_are_range_checked() {
        assert_eq!(color_from_value(&color_value("[1, 2, 3]")), Ok([1, 2, 3]));
        assert!(color_from_value(&color_value("[1, 2, 300]")).is_err());
        assert!(color_from_value(&color_value("[1, 2]")).is_err());
        assert!(color_from_value(&color_value("true")).is_err());
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let txt = default_profile_text().replace("curl_up_deg = 30.0", "curl_up_deg = 170.0");
        let err = Profile::parse(&txt).unwrap_err().to_string();
        assert!(err.contains("curl_up_deg"), "{err}");
    }

    #[test]
    fn rejects_out_of_range_joint() {
        let txt = default_profile_text().replace("wrist = 16", "wrist = 40");
        assert!(Profile::parse(&txt).is_err());
    }

    #[test]
    fn rejects_oversized_frame() {
        let txt = default_profile_text().replace("width = 1280", "width = 100000");
        let err = Profile::parse(&txt).unwrap_err().to_string();
        assert!(err.contains("frame width"), "{err}");
    }

    #[test]
    fn trainer_section_is_optional() {
        let txt = default_profile_text().replace("[trainer]", "[unused]");
        let p = Profile::parse(&txt).unwrap();
        assert_eq!(p.trainer.shoulder, PoseLandmark::RightShoulder.id());
    }

    #[test]
    fn store_installs_default_and_switches() {
        let dir = scratch_dir("store");
        let mut store = ProfileStore::open_at(dir.clone()).unwrap();
        assert_eq!(store.active_name, "default");
        assert_eq!(store.list_profiles(), vec!["default".to_string()]);

        let left_arm = default_profile_text()
            .replace("shoulder = 12", "shoulder = 11")
            .replace("elbow = 14", "elbow = 13")
            .replace("wrist = 16", "wrist = 15");
        fs::write(store.profile_path("left"), left_arm).unwrap();
        store.set_active("left").unwrap();
        assert_eq!(store.profile.trainer.elbow, 13);
        assert!(store.set_active("missing").is_err());
        assert_eq!(store.active_name, "left");

        let reopened = ProfileStore::open_at(dir.clone()).unwrap();
        assert_eq!(reopened.active_name, "left");
        assert_eq!(reopened.list_profiles(), vec!["default", "left"]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn profile_names_stay_inside_the_store() {
        let dir = scratch_dir("names");
        let mut store = ProfileStore::open_at(dir.clone()).unwrap();
        fs::write(dir.join("outside.toml"), default_profile_text()).unwrap();
        for name in ["../outside", "..", ".", "", "a/b", "a\\b"] {
            assert!(store.set_active(name).is_err(), "{name:?}");
            assert!(store.load(name).is_err(), "{name:?}");
        }
        assert_eq!(store.active_name, "default");
        assert_eq!(fs::read_to_string(&store.active_ptr).unwrap(), "default");
        assert!(store.load("default").is_ok());
        let _ = fs::remove_dir_all(&dir);
    }
}
