//! Weapon template generator: turns a desired per-shot damage or DPS into
//! the ballistic / beam parameters the game's weapon templates expect.
//!
//! In-game damage is shot energy in MJ divided by 20. Kinetic weapons get
//! their energy from `0.5 * m * v^2` (kg, km/s gives MJ directly).

use crate::utils::error::{EtlError, Result};
use crate::utils::format::{fmt2, render_table, round_to};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const MJ_PER_DAMAGE: f64 = 20.0;
const DEFAULT_WARHEAD_KG: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum WeaponType {
    Gun,
    Magnetic,
    Laser,
    Particle,
    Plasma,
}

impl WeaponType {
    pub fn is_kinetic(self) -> bool {
        matches!(self, WeaponType::Gun | WeaponType::Magnetic)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WeaponType::Gun => "gun",
            WeaponType::Magnetic => "magnetic",
            WeaponType::Laser => "laser",
            WeaponType::Particle => "particle",
            WeaponType::Plasma => "plasma",
        }
    }
}

impl fmt::Display for WeaponType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeaponType {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gun" => Ok(WeaponType::Gun),
            "magnetic" => Ok(WeaponType::Magnetic),
            "laser" => Ok(WeaponType::Laser),
            "particle" => Ok(WeaponType::Particle),
            "plasma" => Ok(WeaponType::Plasma),
            other => Err(EtlError::InvalidConfigValueError {
                field: "type".to_string(),
                value: other.to_string(),
                reason: "Expected one of gun, magnetic, laser, particle, plasma".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Rounds per second over a full salvo cycle.
pub fn rps_from_timing(cooldown: f64, salvo: u32, intra: f64) -> f64 {
    if salvo == 0 {
        return 0.0;
    }
    let cycle = cooldown + intra * f64::from(salvo - 1);
    if cycle <= 0.0 {
        return f64::INFINITY;
    }
    f64::from(salvo) / cycle
}

pub fn energy_from_damage(damage_in_game: f64) -> f64 {
    damage_in_game * MJ_PER_DAMAGE
}

pub fn damage_from_energy(energy_mj: f64) -> f64 {
    energy_mj / MJ_PER_DAMAGE
}

pub fn kinetic_energy(warhead_kg: f64, muzzle_kps: f64) -> f64 {
    0.5 * warhead_kg * muzzle_kps * muzzle_kps
}

/// v = sqrt(2E/m)
pub fn muzzle_for_energy(energy_mj: f64, warhead_kg: f64) -> Result<f64> {
    if warhead_kg <= 0.0 {
        return Err(EtlError::ValidationError {
            message: "warhead mass must be > 0".to_string(),
        });
    }
    Ok((2.0 * energy_mj / warhead_kg).sqrt())
}

/// m = 2E/v^2
pub fn warhead_for_energy(energy_mj: f64, muzzle_kps: f64) -> Result<f64> {
    if muzzle_kps <= 0.0 {
        return Err(EtlError::ValidationError {
            message: "muzzle velocity must be > 0".to_string(),
        });
    }
    Ok(2.0 * energy_mj / (muzzle_kps * muzzle_kps))
}

// ---------------------------------------------------------------------------
// Snippets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GunParams {
    pub data_name: String,
    pub friendly: String,
    pub damage: Option<f64>,
    pub dps: Option<f64>,
    pub cooldown: f64,
    pub salvo: u32,
    pub intra: f64,
    /// 彈藥總質量（含推進劑）
    pub ammo_mass: Option<f64>,
    pub warhead_mass: Option<f64>,
    pub muzzle_kps: Option<f64>,
    pub propellant_fraction: f64,
}

impl Default for GunParams {
    fn default() -> Self {
        Self {
            data_name: "GeneratedWeapon".to_string(),
            friendly: "GeneratedWeapon".to_string(),
            damage: None,
            dps: None,
            cooldown: 6.0,
            salvo: 1,
            intra: 0.0,
            ammo_mass: None,
            warhead_mass: None,
            muzzle_kps: None,
            propellant_fraction: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BeamParams {
    pub data_name: String,
    pub friendly: String,
    pub shot_power_mj: Option<f64>,
    pub damage: Option<f64>,
    pub cooldown: f64,
    pub efficiency: f64,
    pub wavelength_nm: f64,
    pub mirror_cm: f64,
    pub beam_quality: f64,
    pub jitter: f64,
    pub base_mass: f64,
}

impl Default for BeamParams {
    fn default() -> Self {
        Self {
            data_name: "GeneratedWeapon".to_string(),
            friendly: "GeneratedWeapon".to_string(),
            shot_power_mj: None,
            damage: None,
            cooldown: 6.0,
            efficiency: 1.0,
            wavelength_nm: 810.0,
            mirror_cm: 60.0,
            beam_quality: 1.2,
            jitter: 9e-8,
            base_mass: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GunSnippet {
    #[serde(rename = "dataName")]
    pub data_name: String,
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
    pub mount: String,
    #[serde(rename = "requiredProjectName")]
    pub required_project_name: String,
    pub crew: u32,
    #[serde(rename = "attackMode")]
    pub attack_mode: bool,
    #[serde(rename = "defenseMode")]
    pub defense_mode: bool,
    #[serde(rename = "baseWeaponMass_tons")]
    pub base_weapon_mass_tons: i64,
    pub cooldown_s: f64,
    pub salvo_shots: u32,
    #[serde(rename = "intraSalvoCooldown_s")]
    pub intra_salvo_cooldown_s: f64,
    pub efficiency: u32,
    #[serde(rename = "flatChipping")]
    pub flat_chipping: f64,
    pub magazine: i64,
    #[serde(rename = "ammoMass_kg")]
    pub ammo_mass_kg: f64,
    #[serde(rename = "muzzleVelocity_kps")]
    pub muzzle_velocity_kps: f64,
    #[serde(rename = "bombardmentValue")]
    pub bombardment_value: u32,
    #[serde(rename = "warheadMass_kg")]
    pub warhead_mass_kg: f64,
    #[serde(rename = "targetingRange_km")]
    pub targeting_range_km: u32,
    #[serde(rename = "pivotRange_deg")]
    pub pivot_range_deg: u32,
    #[serde(rename = "isPointDefenseTargetable")]
    pub is_point_defense_targetable: bool,
    #[serde(rename = "_comment_energy_MJ")]
    pub comment_energy_mj: f64,
    #[serde(rename = "_comment_damageInGame")]
    pub comment_damage_in_game: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamSnippet {
    #[serde(rename = "dataName")]
    pub data_name: String,
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
    pub mount: String,
    #[serde(rename = "baseWeaponMass_tons")]
    pub base_weapon_mass_tons: f64,
    pub cooldown_s: f64,
    pub efficiency: f64,
    #[serde(rename = "shotPower_MJ")]
    pub shot_power_mj: f64,
    pub wavelength_nm: f64,
    #[serde(rename = "mirrorRadius_cm")]
    pub mirror_radius_cm: f64,
    pub beam_quality: f64,
    #[serde(rename = "jitter_Rad")]
    pub jitter_rad: f64,
    #[serde(rename = "bombardmentValue")]
    pub bombardment_value: f64,
    #[serde(rename = "targetingRange_km")]
    pub targeting_range_km: u32,
    #[serde(rename = "pivotRange_deg")]
    pub pivot_range_deg: u32,
    #[serde(rename = "_comment_damageInGame")]
    pub comment_damage_in_game: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeaponSnippet {
    Kinetic(GunSnippet),
    Beam(BeamSnippet),
}

impl WeaponSnippet {
    pub fn data_name(&self) -> &str {
        match self {
            WeaponSnippet::Kinetic(s) => &s.data_name,
            WeaponSnippet::Beam(s) => &s.data_name,
        }
    }

    pub fn friendly_name(&self) -> &str {
        match self {
            WeaponSnippet::Kinetic(s) => &s.friendly_name,
            WeaponSnippet::Beam(s) => &s.friendly_name,
        }
    }

    pub fn set_friendly_name(&mut self, name: String) {
        match self {
            WeaponSnippet::Kinetic(s) => s.friendly_name = name,
            WeaponSnippet::Beam(s) => s.friendly_name = name,
        }
    }

    /// Flattened JSON object, used for key lookups in compare tables.
    pub fn as_map(&self) -> serde_json::Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

// Zero counts as "not given", like an unset CLI flag.
fn given(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

pub fn make_gun_snippet(p: &GunParams) -> Result<GunSnippet> {
    // DPS 優先：換算成每發傷害
    let mut damage = p.damage;
    if let Some(dps) = p.dps {
        let rps = rps_from_timing(p.cooldown, p.salvo, p.intra);
        if rps == 0.0 {
            return Err(EtlError::ValidationError {
                message: "computed RPS is zero -- check timing/salvo values".to_string(),
            });
        }
        damage = Some(dps / rps);
    }

    // Analysing an existing weapon: damage comes from warhead + muzzle.
    let damage = match (damage, p.warhead_mass, p.muzzle_kps) {
        (Some(d), _, _) => d,
        (None, Some(w), Some(v)) => damage_from_energy(kinetic_energy(w, v)),
        _ => {
            return Err(EtlError::ValidationError {
                message: "either damage, dps, or both warheadMass+muzzleVelocity must be provided for gun/magnetic type"
                    .to_string(),
            })
        }
    };
    let energy = energy_from_damage(damage);

    let ammo = given(p.ammo_mass);
    let (warhead, muzzle) = match (given(p.warhead_mass), given(p.muzzle_kps)) {
        (Some(w), Some(v)) => (w, v),
        (Some(w), None) => (w, muzzle_for_energy(energy, w)?),
        (None, Some(v)) => (warhead_for_energy(energy, v)?, v),
        (None, None) => {
            let w = match ammo {
                Some(a) if a > 0.0 => a * (1.0 - p.propellant_fraction),
                _ => DEFAULT_WARHEAD_KG,
            };
            (w, muzzle_for_energy(energy, w)?)
        }
    };

    let energy = kinetic_energy(warhead, muzzle);
    let damage_calc = damage_from_energy(energy);

    Ok(GunSnippet {
        data_name: p.data_name.clone(),
        friendly_name: p.friendly.clone(),
        mount: "OneHull".to_string(),
        required_project_name: format!("Project_{}", p.data_name),
        crew: 3,
        attack_mode: true,
        defense_mode: false,
        base_weapon_mass_tons: (((warhead + ammo.unwrap_or(warhead)) / 100.0).trunc() as i64).max(1),
        cooldown_s: p.cooldown,
        salvo_shots: p.salvo,
        intra_salvo_cooldown_s: p.intra,
        efficiency: 1,
        flat_chipping: round_to(1.0 + warhead / 100.0, 3),
        magazine: (ammo.unwrap_or(100.0) * 5.0).max(10.0).trunc() as i64,
        ammo_mass_kg: round_to(
            ammo.unwrap_or(warhead * (1.0 + p.propellant_fraction)),
            2,
        ),
        muzzle_velocity_kps: round_to(muzzle, 6),
        bombardment_value: 1,
        warhead_mass_kg: round_to(warhead, 3),
        targeting_range_km: 900,
        pivot_range_deg: 90,
        is_point_defense_targetable: false,
        comment_energy_mj: round_to(energy, 3),
        comment_damage_in_game: round_to(damage_calc, 3),
    })
}

pub fn make_beam_snippet(p: &BeamParams) -> Result<BeamSnippet> {
    let shot_power = p
        .shot_power_mj
        .or(p.damage.map(energy_from_damage))
        .ok_or_else(|| EtlError::ValidationError {
            message: "Provide either shot_power_MJ or damage for laser type".to_string(),
        })?;

    Ok(BeamSnippet {
        data_name: p.data_name.clone(),
        friendly_name: p.friendly.clone(),
        mount: "OneHull".to_string(),
        base_weapon_mass_tons: p.base_mass,
        cooldown_s: p.cooldown,
        efficiency: p.efficiency,
        shot_power_mj: shot_power,
        wavelength_nm: p.wavelength_nm,
        mirror_radius_cm: p.mirror_cm,
        beam_quality: p.beam_quality,
        jitter_rad: p.jitter,
        bombardment_value: 0.2,
        targeting_range_km: 600,
        pivot_range_deg: 180,
        comment_damage_in_game: round_to(damage_from_energy(shot_power), 3),
    })
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeaponStats {
    #[serde(rename = "damageInGame")]
    pub damage_in_game: f64,
    #[serde(rename = "energy_MJ")]
    pub energy_mj: f64,
    pub rps: f64,
    pub dps: f64,
    #[serde(rename = "muzzle_kps", skip_serializing_if = "Option::is_none")]
    pub muzzle_kps: Option<f64>,
    #[serde(rename = "warhead_kg", skip_serializing_if = "Option::is_none")]
    pub warhead_kg: Option<f64>,
    #[serde(rename = "shotPower_MJ", skip_serializing_if = "Option::is_none")]
    pub shot_power_mj: Option<f64>,
}

pub fn compute_stats(snippet: &WeaponSnippet) -> WeaponStats {
    match snippet {
        WeaponSnippet::Kinetic(s) => {
            let energy = kinetic_energy(s.warhead_mass_kg, s.muzzle_velocity_kps);
            let damage = damage_from_energy(energy);
            let rps = rps_from_timing(s.cooldown_s, s.salvo_shots, s.intra_salvo_cooldown_s);
            WeaponStats {
                damage_in_game: round_to(damage, 2),
                energy_mj: round_to(energy, 2),
                rps: round_to(rps, 2),
                dps: round_to(damage * rps, 2),
                muzzle_kps: Some(round_to(s.muzzle_velocity_kps, 2)),
                warhead_kg: Some(round_to(s.warhead_mass_kg, 2)),
                shot_power_mj: None,
            }
        }
        WeaponSnippet::Beam(s) => {
            let damage = damage_from_energy(s.shot_power_mj);
            let rps = if s.cooldown_s > 0.0 {
                1.0 / s.cooldown_s
            } else {
                0.0
            };
            WeaponStats {
                damage_in_game: round_to(damage, 2),
                energy_mj: round_to(s.shot_power_mj, 2),
                rps: round_to(rps, 2),
                dps: round_to(damage * rps, 2),
                muzzle_kps: None,
                warhead_kg: None,
                shot_power_mj: Some(round_to(s.shot_power_mj, 2)),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Random examples and names
// ---------------------------------------------------------------------------

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

pub fn random_gun_examples<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<Vec<GunSnippet>> {
    const COOLDOWNS: [f64; 4] = [4.0, 6.0, 8.0, 10.0];

    (0..n)
        .map(|i| {
            let damage = rng.gen_range(3.5..=8.5);
            let cooldown = COOLDOWNS[rng.gen_range(0..COOLDOWNS.len())];
            let salvo = rng.gen_range(1..=3u32);
            let intra = if salvo > 1 { 0.25 } else { 0.0 };
            let warhead = rng.gen_range(20.0..=80.0);
            let ammo = warhead * rng.gen_range(1.2..=1.6);

            make_gun_snippet(&GunParams {
                data_name: format!("RandGun{}", i),
                friendly: format!("Random Gun {}", i),
                damage: Some(damage),
                cooldown,
                salvo,
                intra,
                ammo_mass: Some(ammo),
                warhead_mass: Some(warhead),
                ..GunParams::default()
            })
        })
        .collect()
}

fn name_prefixes(wtype: WeaponType) -> [&'static str; 10] {
    match wtype {
        WeaponType::Gun => [
            "Siege", "Thunder", "Iron", "Rupture", "Breaker", "Breach", "Mael", "Pound", "Rivet", "Anvil",
        ],
        WeaponType::Magnetic => [
            "Gauss", "Rail", "Vector", "Magna", "Shock", "Pull", "Stride", "Impulse", "Prime", "Null",
        ],
        WeaponType::Laser => [
            "Lumen", "Solar", "Photon", "Pulse", "Raster", "Aurora", "Prism", "Haze", "Quanta", "Beam",
        ],
        WeaponType::Particle => [
            "Flux", "Ion", "Spatter", "Vortex", "Corona", "Ionize", "Cascade", "Fermion", "Quark", "Nova",
        ],
        WeaponType::Plasma => [
            "Plasma", "Torch", "Helion", "Blaze", "Inferno", "Corona", "Cinder", "Scorch", "Flux", "Torch",
        ],
    }
}

/// 依武器數值挑選形容詞，組合出建議名稱
pub fn generate_name<R: Rng + ?Sized>(snippet: &WeaponSnippet, wtype: WeaponType, rng: &mut R) -> String {
    const MIDDLES: [&str; 10] = [
        "Breaker", "Cannon", "Emitter", "Array", "Driver", "Launcher", "Discharger", "Projector", "Launcher",
        "Core",
    ];
    const SUFFIXES: [&str; 10] = [
        "Mark I", "Mk II", "Prime", "Alpha", "Beta", "Omega", "Vanguard", "Aegis", "X", "V",
    ];

    let prefix = pick(rng, &name_prefixes(wtype));

    let adjective = match snippet {
        WeaponSnippet::Kinetic(s) => {
            let mass = s.base_weapon_mass_tons as f64;
            let muzzle = s.muzzle_velocity_kps;
            if mass >= 50.0 && muzzle < 2.5 {
                pick(rng, &["Siegebreaker", "Slowstrike", "Colossus"])
            } else if muzzle >= 3.0 && mass < 10.0 {
                pick(rng, &["Swift", "Razor", "Rapid"])
            } else {
                pick(rng, &["Heavy", "Longshot", "Thunder"])
            }
        }
        WeaponSnippet::Beam(s) if s.shot_power_mj >= 100.0 => pick(rng, &["Auger", "Incisor", "Singularity"]),
        WeaponSnippet::Beam(_) => pick(rng, &["Pulse", "Focus", "Prism"]),
    };

    let middle = pick(rng, &MIDDLES);
    let suffix = pick(rng, &SUFFIXES);

    match rng.gen_range(0..4) {
        0 => format!("{} {}", prefix, middle),
        1 => format!("{} {}", adjective, middle),
        2 => format!("{} {}", prefix, adjective),
        _ => format!("{}-{} {}", prefix, adjective, suffix),
    }
}

// ---------------------------------------------------------------------------
// Compare mode
// ---------------------------------------------------------------------------

/// Parses `type=gun cooldown=6 name="Big Gun"` into key/value pairs.
/// Tokens without `=` are ignored.
pub fn parse_kv_string(s: &str) -> Result<HashMap<String, String>> {
    let re = Regex::new(r#"([^\s=]+)=(?:"([^"]*)"|'([^']*)'|(\S*))"#)?;

    Ok(re
        .captures_iter(s)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            (caps[1].to_string(), value)
        })
        .collect())
}

fn kv_number(map: &HashMap<String, String>, key: &str) -> Result<Option<f64>> {
    map.get(key)
        .map(|raw| {
            raw.parse::<f64>().map_err(|_| EtlError::InvalidConfigValueError {
                field: key.to_string(),
                value: raw.clone(),
                reason: "Expected a number".to_string(),
            })
        })
        .transpose()
}

// Missing or zero falls back to the default.
fn kv_number_or(map: &HashMap<String, String>, key: &str, default: f64) -> Result<f64> {
    Ok(given(kv_number(map, key)?).unwrap_or(default))
}

pub fn build_from_map(
    map: &HashMap<String, String>,
    default_type: Option<WeaponType>,
) -> Result<(WeaponType, WeaponSnippet)> {
    let wtype = match map.get("type") {
        Some(t) => t.parse()?,
        None => default_type.ok_or_else(|| EtlError::MissingConfigError {
            field: "type".to_string(),
        })?,
    };

    let name = map
        .get("name")
        .or_else(|| map.get("dataName"))
        .cloned()
        .unwrap_or_else(|| "LHS".to_string());
    let friendly = map.get("friendly").cloned().unwrap_or_else(|| name.clone());

    let snippet = if wtype.is_kinetic() {
        let salvo = kv_number_or(map, "salvo", 1.0)?;
        WeaponSnippet::Kinetic(make_gun_snippet(&GunParams {
            data_name: name,
            friendly,
            damage: kv_number(map, "damage")?,
            dps: kv_number(map, "dps")?,
            cooldown: kv_number_or(map, "cooldown", 6.0)?,
            salvo: salvo.max(0.0).trunc() as u32,
            intra: kv_number_or(map, "intra", 0.0)?,
            ammo_mass: kv_number(map, "ammoMass")?,
            warhead_mass: kv_number(map, "warheadMass")?,
            muzzle_kps: kv_number(map, "muzzleVelocity")?,
            propellant_fraction: kv_number_or(map, "propellantFraction", 0.4)?,
        })?)
    } else {
        WeaponSnippet::Beam(make_beam_snippet(&BeamParams {
            data_name: name,
            friendly,
            shot_power_mj: kv_number(map, "shotPower_MJ")?,
            damage: kv_number(map, "damage")?,
            cooldown: kv_number_or(map, "cooldown", 6.0)?,
            efficiency: kv_number_or(map, "efficiency", 1.0)?,
            wavelength_nm: kv_number_or(map, "wavelength_nm", 810.0)?,
            mirror_cm: kv_number_or(map, "mirror_cm", 60.0)?,
            beam_quality: kv_number_or(map, "beam_quality", 1.2)?,
            jitter: kv_number_or(map, "jitter", 9e-8)?,
            base_mass: kv_number_or(map, "base_mass", 150.0)?,
        })?)
    };

    Ok((wtype, snippet))
}

fn lookup(stats: &serde_json::Map<String, Value>, snippet: &serde_json::Map<String, Value>, key: &str) -> Value {
    stats
        .get(key)
        .or_else(|| snippet.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}

fn cell(value: &Value) -> String {
    match value {
        Value::Number(n) => n.as_f64().map(|f| format!("{:.2}", f)).unwrap_or_default(),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 左右兩組參數逐項比較，差值附上百分比
pub fn compare_table(left: &str, right: &str, default_type: Option<WeaponType>) -> Result<String> {
    let left_map = parse_kv_string(left)?;
    let right_map = parse_kv_string(right)?;

    let (left_type, left_snip) = build_from_map(&left_map, default_type)?;
    let (_, right_snip) = build_from_map(&right_map, default_type)?;

    let as_map = |stats: WeaponStats| match serde_json::to_value(stats) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    let left_stats = as_map(compute_stats(&left_snip));
    let right_stats = as_map(compute_stats(&right_snip));
    let left_fields = left_snip.as_map();
    let right_fields = right_snip.as_map();

    let mut keys: Vec<&str> = if left_type.is_kinetic() {
        vec!["damageInGame", "energy_MJ", "dps", "rps", "warhead_kg", "muzzle_kps", "cooldown_s"]
    } else {
        vec!["damageInGame", "energy_MJ", "dps", "rps", "shotPower_MJ", "baseWeaponMass_tons", "cooldown_s"]
    };
    if left_type.is_kinetic() && left_map.contains_key("magazine") && right_map.contains_key("magazine") {
        keys.insert(6, "magazine");
    }

    let header = vec![
        "stat".to_string(),
        format!("left ({})", left_snip.friendly_name()),
        format!("right ({})", right_snip.friendly_name()),
        "diff".to_string(),
    ];

    let rows: Vec<Vec<String>> = keys
        .iter()
        .map(|key| {
            let lv = lookup(&left_stats, &left_fields, key);
            let rv = lookup(&right_stats, &right_fields, key);
            let diff = match (lv.as_f64(), rv.as_f64()) {
                (Some(l), Some(r)) => diff_cell(l, r),
                _ => String::new(),
            };
            vec![key.to_string(), cell(&lv), cell(&rv), diff]
        })
        .collect();

    Ok(render_table(&header, &rows))
}

fn diff_cell(left: f64, right: f64) -> String {
    let diff = left - right;
    let pct = if right == 0.0 {
        if diff != 0.0 {
            "(inf%)".to_string()
        } else {
            "(+0.00%)".to_string()
        }
    } else {
        format!("({:+.2}%)", diff / right * 100.0)
    };
    format!("{:+.2} {}", diff, pct)
}

// ---------------------------------------------------------------------------
// Generated output
// ---------------------------------------------------------------------------

pub fn results_table(results: &[WeaponSnippet], wtype: WeaponType) -> String {
    let (header, rows): (Vec<&str>, Vec<Vec<String>>) = if wtype.is_kinetic() {
        let header = vec![
            "name", "dataName", "dmg", "dps", "rps", "warhead_kg", "muzzle_kps", "cooldown", "salvo", "magazine",
        ];
        let rows = results
            .iter()
            .map(|sn| {
                let stats = compute_stats(sn);
                let fields = sn.as_map();
                let field = |k: &str| fields.get(k).map(cell).unwrap_or_default();
                vec![
                    sn.friendly_name().to_string(),
                    sn.data_name().to_string(),
                    fmt2(Some(stats.damage_in_game)),
                    fmt2(Some(stats.dps)),
                    fmt2(Some(stats.rps)),
                    fmt2(stats.warhead_kg),
                    fmt2(stats.muzzle_kps),
                    field("cooldown_s"),
                    field("salvo_shots"),
                    field("magazine"),
                ]
            })
            .collect();
        (header, rows)
    } else {
        let header = vec!["name", "dataName", "dmg", "dps", "shot_MJ", "cooldown", "mass_tons"];
        let rows = results
            .iter()
            .map(|sn| {
                let stats = compute_stats(sn);
                let fields = sn.as_map();
                let field = |k: &str| fields.get(k).map(cell).unwrap_or_default();
                vec![
                    sn.friendly_name().to_string(),
                    sn.data_name().to_string(),
                    fmt2(Some(stats.damage_in_game)),
                    fmt2(Some(stats.dps)),
                    fmt2(stats.shot_power_mj),
                    field("cooldown_s"),
                    field("baseWeaponMass_tons"),
                ]
            })
            .collect();
        (header, rows)
    };

    let header: Vec<String> = header.into_iter().map(String::from).collect();
    render_table(&header, &rows)
}

pub fn results_json(results: &[WeaponSnippet]) -> Result<String> {
    Ok(match results {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    })
}

// ---------------------------------------------------------------------------
// Scanning existing templates
// ---------------------------------------------------------------------------

/// Template files in report order.
pub const TEMPLATE_FILES: [(&str, WeaponType); 5] = [
    ("TIGunTemplate.json", WeaponType::Gun),
    ("TILaserWeaponTemplate.json", WeaponType::Laser),
    ("TIMagneticGunTemplate.json", WeaponType::Magnetic),
    ("TIParticleWeaponTemplate.json", WeaponType::Particle),
    ("TIPlasmaWeaponTemplate.json", WeaponType::Plasma),
];

const EXCLUDED_NAMES: [&str; 4] = ["t1base", "t2base", "t3base", "regiondefense"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ScanSort {
    #[default]
    None,
    /// Global DPS, descending.
    Dps,
    /// Grouped by type, DPS descending inside each group.
    Grouped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanRow {
    pub wtype: WeaponType,
    pub data_name: String,
    pub friendly: String,
    pub damage: Option<f64>,
    pub energy_mj: Option<f64>,
    pub dps: Option<f64>,
    pub rps: f64,
    pub warhead_kg: Option<f64>,
    pub muzzle_kps: Option<f64>,
    pub cooldown: f64,
    pub salvo: i64,
    pub magazine: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    pub types: Option<Vec<WeaponType>>,
    pub include_alien: bool,
    pub sort: ScanSort,
}

fn text_field(entry: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| entry.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or("")
        .to_string()
}

fn as_number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

// First key holding a non-zero number.
fn number_field(entry: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| entry.get(*k).and_then(as_number))
        .find(|v| *v != 0.0)
}

pub fn scan_entry(entry: &Value, wtype: WeaponType, source: &str) -> ScanRow {
    let warhead = number_field(entry, &["warheadMass_kg", "warheadMass"]);
    let muzzle = number_field(entry, &["muzzleVelocity_kps", "muzzleVelocity"]);

    let energy = if let Some(v) = entry.get("damage_MJ") {
        Some(as_number(v).unwrap_or(0.0))
    } else if let Some(v) = entry.get("shotPower_MJ") {
        Some(as_number(v).unwrap_or(0.0))
    } else {
        match (
            number_field(entry, &["warheadMass_kg"]),
            number_field(entry, &["muzzleVelocity_kps"]),
        ) {
            (Some(w), Some(v)) => Some(kinetic_energy(w, v)),
            _ => None,
        }
    };
    let damage = energy.map(damage_from_energy);

    let cooldown = number_field(entry, &["cooldown_s", "cooldown"]).unwrap_or(0.0);
    let salvo = number_field(entry, &["salvo_shots", "salvo"]).unwrap_or(1.0);
    let intra = number_field(entry, &["intraSalvoCooldown_s", "intra"]).unwrap_or(0.0);

    let rps = if wtype.is_kinetic() {
        rps_from_timing(cooldown, salvo.max(0.0).trunc() as u32, intra)
    } else if cooldown > 0.0 {
        1.0 / cooldown
    } else {
        0.0
    };

    let magazine = entry.get("magazine").and_then(|m| match m {
        Value::Null => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    });

    ScanRow {
        wtype,
        data_name: text_field(entry, &["dataName", "name"]),
        friendly: text_field(entry, &["friendlyName"]),
        damage,
        energy_mj: energy,
        dps: damage.map(|d| d * rps),
        rps,
        warhead_kg: warhead,
        muzzle_kps: muzzle,
        cooldown,
        salvo: salvo.trunc() as i64,
        magazine,
        source: source.to_string(),
    }
}

/// Reads every known template file from each `(dir, tag)` source.
/// Unreadable files are skipped.
pub fn scan_templates(sources: &[(PathBuf, String)]) -> Vec<ScanRow> {
    let mut rows = Vec::new();
    for (file_name, wtype) in TEMPLATE_FILES {
        for (dir, tag) in sources {
            let path = dir.join(file_name);
            let Some(entries) = read_array(&path) else {
                continue;
            };
            rows.extend(
                entries
                    .iter()
                    .filter(|e| e.is_object())
                    .map(|e| scan_entry(e, wtype, tag)),
            );
        }
    }
    rows
}

fn read_array(path: &Path) -> Option<Vec<Value>> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(Value::Array(items)) => Some(items),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Skipping {}: {}", path.display(), e);
            None
        }
    }
}

fn dps_key(row: &ScanRow) -> f64 {
    row.dps.unwrap_or(f64::NEG_INFINITY)
}

pub fn filter_and_sort(rows: Vec<ScanRow>, filter: &ScanFilter) -> Vec<ScanRow> {
    let mut rows: Vec<ScanRow> = rows
        .into_iter()
        .filter(|r| filter.types.as_ref().map_or(true, |types| types.contains(&r.wtype)))
        .filter(|r| {
            let dn = r.data_name.to_lowercase();
            let fname = r.friendly.to_lowercase();
            let excluded = EXCLUDED_NAMES
                .iter()
                .any(|p| dn.contains(p) || fname.contains(p));
            // 外星武器預設不列出
            let alien = dn.contains("alien") || fname.contains("alien");
            !excluded && (filter.include_alien || !alien)
        })
        .collect();

    let by_dps_desc = |a: &ScanRow, b: &ScanRow| dps_key(b).total_cmp(&dps_key(a));
    match filter.sort {
        ScanSort::None => {}
        ScanSort::Dps => rows.sort_by(by_dps_desc),
        ScanSort::Grouped => {
            let group = |t: WeaponType| {
                TEMPLATE_FILES
                    .iter()
                    .position(|(_, wt)| *wt == t)
                    .unwrap_or(TEMPLATE_FILES.len())
            };
            rows.sort_by(|a, b| group(a.wtype).cmp(&group(b.wtype)).then_with(|| by_dps_desc(a, b)));
        }
    }
    rows
}

pub fn scan_table(rows: &[ScanRow]) -> String {
    let header: Vec<String> = [
        "type", "dataName", "friendly", "dmg", "MJ", "dps", "rps", "warhead", "muzzle", "cd", "salvo", "mag", "src",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.wtype.to_string(),
                r.data_name.clone(),
                r.friendly.clone(),
                fmt2(r.damage),
                fmt2(r.energy_mj),
                fmt2(r.dps),
                fmt2(Some(r.rps)),
                fmt2(r.warhead_kg),
                fmt2(r.muzzle_kps),
                fmt2(Some(r.cooldown)),
                r.salvo.to_string(),
                r.magazine.clone().unwrap_or_default(),
                r.source.clone(),
            ]
        })
        .collect();

    render_table(&header, &body)
}
