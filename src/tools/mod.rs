pub mod archive;
pub mod mods;
pub mod outline;
pub mod weapon;
