use serde::{Deserialize, Serialize};

/// Named tempo markings. Multipliers scale every duration: above 1.0 is
/// slower than the reference (`Moderato`), below 1.0 is faster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tempo {
    Largo,
    Adagio,
    Andante,
    Moderato,
    Allegro,
    Presto,
}

pub const REFERENCE_MULTIPLIER: f32 = 1.0;

impl Tempo {
    pub const ALL: [Tempo; 6] = [
        Tempo::Largo,
        Tempo::Adagio,
        Tempo::Andante,
        Tempo::Moderato,
        Tempo::Allegro,
        Tempo::Presto,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tempo::Largo => "Largo",
            Tempo::Adagio => "Adagio",
            Tempo::Andante => "Andante",
            Tempo::Moderato => "Moderato",
            Tempo::Allegro => "Allegro",
            Tempo::Presto => "Presto",
        }
    }

    pub fn multiplier(self) -> f32 {
        match self {
            Tempo::Largo => 1.6,
            Tempo::Adagio => 1.4,
            Tempo::Andante => 1.2,
            Tempo::Moderato => REFERENCE_MULTIPLIER,
            Tempo::Allegro => 0.8,
            Tempo::Presto => 0.6,
        }
    }

    /// Case-insensitive, surrounding whitespace ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|tempo| tempo.name().eq_ignore_ascii_case(name))
    }
}

/// Unknown or missing names resolve to the reference multiplier.
pub fn resolve_tempo_multiplier(name: Option<&str>) -> f32 {
    name.and_then(Tempo::from_name)
        .map(Tempo::multiplier)
        .unwrap_or(REFERENCE_MULTIPLIER)
}
