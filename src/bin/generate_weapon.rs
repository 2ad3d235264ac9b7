use anyhow::{bail, Context};
use campaign_etl::tools::weapon::{
    compare_table, filter_and_sort, generate_name, make_beam_snippet, make_gun_snippet, random_gun_examples,
    results_json, results_table, scan_table, scan_templates, BeamParams, GunParams, ScanFilter, ScanSort,
    WeaponSnippet, WeaponType,
};
use campaign_etl::utils::logger;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

#[derive(Parser, Debug)]
#[command(name = "generate-weapon")]
#[command(about = "Generate Terra Invicta weapon template snippets from desired damage or DPS")]
struct Args {
    #[arg(long = "type", value_enum)]
    wtype: Option<WeaponType>,

    /// Desired per-shot damageInGame
    #[arg(long)]
    damage: Option<f64>,

    /// Desired DPS (per-shot damage is derived from the timing)
    #[arg(long)]
    dps: Option<f64>,

    #[arg(long, default_value_t = 6.0)]
    cooldown: f64,

    #[arg(long, default_value_t = 1)]
    salvo: u32,

    #[arg(long, default_value_t = 0.0)]
    intra: f64,

    /// Ammo mass kg (includes propellant)
    #[arg(long = "ammoMass")]
    ammo_mass: Option<f64>,

    #[arg(long = "warheadMass")]
    warhead_mass: Option<f64>,

    /// Muzzle velocity kps
    #[arg(long = "muzzleVelocity")]
    muzzle_velocity: Option<f64>,

    #[arg(long = "propellantFraction", default_value_t = 0.4)]
    propellant_fraction: f64,

    /// Shot energy for beam weapons
    #[arg(long = "shotPower_MJ")]
    shot_power_mj: Option<f64>,

    #[arg(long, default_value_t = 1.0)]
    efficiency: f64,

    #[arg(long = "wavelength_nm", default_value_t = 810.0)]
    wavelength_nm: f64,

    #[arg(long = "mirror_cm", default_value_t = 60.0)]
    mirror_cm: f64,

    #[arg(long = "beam_quality", default_value_t = 1.2)]
    beam_quality: f64,

    #[arg(long, default_value_t = 9e-8)]
    jitter: f64,

    #[arg(long = "base_mass", default_value_t = 150.0)]
    base_mass: f64,

    #[arg(long, default_value = "GeneratedWeapon")]
    name: String,

    #[arg(long)]
    friendly: Option<String>,

    /// Generate N random kinetic examples
    #[arg(long, default_value_t = 0)]
    random: usize,

    #[arg(long, value_enum, default_value = "json")]
    output: OutputFormat,

    /// Compare two parameter sets given with --left and --right
    #[arg(long)]
    compare: bool,

    /// e.g. "type=gun cooldown=6 salvo=2 warheadMass=40"
    #[arg(long)]
    left: Option<String>,

    #[arg(long)]
    right: Option<String>,

    /// Print one-line stats for the game's and the mods' weapon templates
    #[arg(long)]
    scan_existing: bool,

    #[arg(long, value_enum, default_value = "none")]
    sort: ScanSort,

    /// Comma-separated weapon types to include when scanning
    #[arg(long, value_enum, value_delimiter = ',')]
    filter_type: Vec<WeaponType>,

    /// Include alien weapons when scanning
    #[arg(long)]
    include_alien: bool,

    /// Game templates directory (defaults to ~/Games/TerraInvicta/templates)
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    #[arg(long, default_value = "Mods")]
    mods_dir: PathBuf,

    #[arg(short, long)]
    verbose: bool,
}

fn game_templates_dir(args: &Args) -> Option<PathBuf> {
    args.templates_dir
        .clone()
        .or_else(|| dirs::home_dir().map(|home| home.join("Games").join("TerraInvicta").join("templates")))
        .filter(|dir| dir.is_dir())
}

fn scan(args: &Args) -> i32 {
    let Some(base_dir) = game_templates_dir(args) else {
        eprintln!("Templates directory not found; checked candidate locations");
        return 1;
    };
    tracing::info!("Scanning templates in {}", base_dir.display());

    let sources = vec![(base_dir, String::new()), (args.mods_dir.clone(), "MOD".to_string())];
    let filter = ScanFilter {
        types: (!args.filter_type.is_empty()).then(|| args.filter_type.clone()),
        include_alien: args.include_alien,
        sort: args.sort,
    };
    let rows = filter_and_sort(scan_templates(&sources), &filter);
    if !rows.is_empty() {
        println!("{}", scan_table(&rows));
    }
    0
}

fn generate(args: &Args, wtype: WeaponType) -> anyhow::Result<Vec<WeaponSnippet>> {
    if args.random > 0 && wtype.is_kinetic() {
        let guns = random_gun_examples(args.random, &mut rand::thread_rng())?;
        return Ok(guns.into_iter().map(WeaponSnippet::Kinetic).collect());
    }

    let friendly = args.friendly.clone().unwrap_or_else(|| args.name.clone());
    let snippet = if wtype.is_kinetic() {
        let mut snippet = WeaponSnippet::Kinetic(make_gun_snippet(&GunParams {
            data_name: args.name.clone(),
            friendly,
            damage: args.damage,
            dps: args.dps,
            cooldown: args.cooldown,
            salvo: args.salvo,
            intra: args.intra,
            ammo_mass: args.ammo_mass,
            warhead_mass: args.warhead_mass,
            muzzle_kps: args.muzzle_velocity,
            propellant_fraction: args.propellant_fraction,
        })?);
        // 沒有指定顯示名稱時給一個建議名稱
        if args.friendly.is_none() {
            let suggested = generate_name(&snippet, wtype, &mut rand::thread_rng());
            snippet.set_friendly_name(suggested);
        }
        snippet
    } else {
        WeaponSnippet::Beam(make_beam_snippet(&BeamParams {
            data_name: args.name.clone(),
            friendly,
            shot_power_mj: args.shot_power_mj,
            damage: args.damage,
            cooldown: args.cooldown,
            efficiency: args.efficiency,
            wavelength_nm: args.wavelength_nm,
            mirror_cm: args.mirror_cm,
            beam_quality: args.beam_quality,
            jitter: args.jitter,
            base_mass: args.base_mass,
        })?)
    };
    Ok(vec![snippet])
}

fn run(args: &Args) -> anyhow::Result<()> {
    if args.compare {
        let (Some(left), Some(right)) = (&args.left, &args.right) else {
            bail!("--compare requires --left and --right parameter strings");
        };
        let table = compare_table(left, right, args.wtype).context("building comparison")?;
        println!("{}", table);
        return Ok(());
    }

    let Some(wtype) = args.wtype else {
        bail!("--type is required unless --compare or --scan-existing is used");
    };
    let results = generate(args, wtype)?;

    match args.output {
        OutputFormat::Table => println!("{}", results_table(&results, wtype)),
        OutputFormat::Json => println!("{}", results_json(&results)?),
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if args.scan_existing {
        std::process::exit(scan(&args));
    }

    if let Err(e) = run(&args) {
        tracing::debug!("generate-weapon failed: {:?}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(2);
    }
}
