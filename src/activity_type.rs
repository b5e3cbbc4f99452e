use serde::{Deserialize, Serialize};
use std::fmt;

/// Activity type vocabulary shared by every importer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    Running,
    TrailRunning,
    TreadmillRunning,
    TrackRunning,
    Walking,
    NordicWalking,
    Hiking,
    Mountaineering,
    Orienteering,
    Cycling,
    IndoorCycling,
    MountainBiking,
    GravelCycling,
    EBiking,
    Swimming,
    PoolSwimming,
    OpenWaterSwimming,
    Triathlon,
    Multisport,
    Transition,
    CrossCountrySkiing,
    DownhillSkiing,
    SkiTouring,
    Snowboarding,
    SnowShoeing,
    IceSkating,
    RollerSkating,
    Skateboarding,
    Rowing,
    IndoorRowing,
    Paddling,
    Kayaking,
    StandUpPaddling,
    Sailing,
    Surfing,
    Kitesurfing,
    Climbing,
    Golf,
    Tennis,
    Soccer,
    Basketball,
    BallGames,
    Gym,
    StrengthTraining,
    Yoga,
    FitnessClass,
    Elliptical,
    HorsebackRiding,
    Motorsports,
    Parkour,
    Other,
    Unknown,
}

impl ActivityType {
    pub const ALL: [ActivityType; 52] = [
        ActivityType::Running,
        ActivityType::TrailRunning,
        ActivityType::TreadmillRunning,
        ActivityType::TrackRunning,
        ActivityType::Walking,
        ActivityType::NordicWalking,
        ActivityType::Hiking,
        ActivityType::Mountaineering,
        ActivityType::Orienteering,
        ActivityType::Cycling,
        ActivityType::IndoorCycling,
        ActivityType::MountainBiking,
        ActivityType::GravelCycling,
        ActivityType::EBiking,
        ActivityType::Swimming,
        ActivityType::PoolSwimming,
        ActivityType::OpenWaterSwimming,
        ActivityType::Triathlon,
        ActivityType::Multisport,
        ActivityType::Transition,
        ActivityType::CrossCountrySkiing,
        ActivityType::DownhillSkiing,
        ActivityType::SkiTouring,
        ActivityType::Snowboarding,
        ActivityType::SnowShoeing,
        ActivityType::IceSkating,
        ActivityType::RollerSkating,
        ActivityType::Skateboarding,
        ActivityType::Rowing,
        ActivityType::IndoorRowing,
        ActivityType::Paddling,
        ActivityType::Kayaking,
        ActivityType::StandUpPaddling,
        ActivityType::Sailing,
        ActivityType::Surfing,
        ActivityType::Kitesurfing,
        ActivityType::Climbing,
        ActivityType::Golf,
        ActivityType::Tennis,
        ActivityType::Soccer,
        ActivityType::Basketball,
        ActivityType::BallGames,
        ActivityType::Gym,
        ActivityType::StrengthTraining,
        ActivityType::Yoga,
        ActivityType::FitnessClass,
        ActivityType::Elliptical,
        ActivityType::HorsebackRiding,
        ActivityType::Motorsports,
        ActivityType::Parkour,
        ActivityType::Other,
        ActivityType::Unknown,
    ];

    /// Human readable name, also used in the canonical document
    pub fn display_name(&self) -> &'static str {
        match self {
            ActivityType::Running => "Running",
            ActivityType::TrailRunning => "Trail Running",
            ActivityType::TreadmillRunning => "Treadmill Running",
            ActivityType::TrackRunning => "Track Running",
            ActivityType::Walking => "Walking",
            ActivityType::NordicWalking => "Nordic Walking",
            ActivityType::Hiking => "Hiking",
            ActivityType::Mountaineering => "Mountaineering",
            ActivityType::Orienteering => "Orienteering",
            ActivityType::Cycling => "Cycling",
            ActivityType::IndoorCycling => "Indoor Cycling",
            ActivityType::MountainBiking => "Mountain Biking",
            ActivityType::GravelCycling => "Gravel Cycling",
            ActivityType::EBiking => "E-Biking",
            ActivityType::Swimming => "Swimming",
            ActivityType::PoolSwimming => "Pool Swimming",
            ActivityType::OpenWaterSwimming => "Open Water Swimming",
            ActivityType::Triathlon => "Triathlon",
            ActivityType::Multisport => "Multisport",
            ActivityType::Transition => "Transition",
            ActivityType::CrossCountrySkiing => "Cross Country Skiing",
            ActivityType::DownhillSkiing => "Downhill Skiing",
            ActivityType::SkiTouring => "Ski Touring",
            ActivityType::Snowboarding => "Snowboarding",
            ActivityType::SnowShoeing => "Snow Shoeing",
            ActivityType::IceSkating => "Ice Skating",
            ActivityType::RollerSkating => "Roller Skating",
            ActivityType::Skateboarding => "Skateboarding",
            ActivityType::Rowing => "Rowing",
            ActivityType::IndoorRowing => "Indoor Rowing",
            ActivityType::Paddling => "Paddling",
            ActivityType::Kayaking => "Kayaking",
            ActivityType::StandUpPaddling => "Stand Up Paddling",
            ActivityType::Sailing => "Sailing",
            ActivityType::Surfing => "Surfing",
            ActivityType::Kitesurfing => "Kitesurfing",
            ActivityType::Climbing => "Climbing",
            ActivityType::Golf => "Golf",
            ActivityType::Tennis => "Tennis",
            ActivityType::Soccer => "Soccer",
            ActivityType::Basketball => "Basketball",
            ActivityType::BallGames => "Ball Games",
            ActivityType::Gym => "Gym",
            ActivityType::StrengthTraining => "Strength Training",
            ActivityType::Yoga => "Yoga",
            ActivityType::FitnessClass => "Fitness Class",
            ActivityType::Elliptical => "Elliptical",
            ActivityType::HorsebackRiding => "Horseback Riding",
            ActivityType::Motorsports => "Motorsports",
            ActivityType::Parkour => "Parkour",
            ActivityType::Other => "Other",
            ActivityType::Unknown => "Unknown",
        }
    }

    /// Resolve a display name or a loosely formatted label ("trail_running",
    /// "MOUNTAIN BIKING"). Unrecognized names map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return ActivityType::Unknown;
        }
        if let Some(found) = Self::ALL
            .iter()
            .find(|t| normalize(t.display_name()) == wanted)
        {
            return *found;
        }
        match wanted.as_str() {
            "run" => ActivityType::Running,
            "walk" => ActivityType::Walking,
            "bike" | "biking" | "ride" | "roadcycling" => ActivityType::Cycling,
            "mtb" => ActivityType::MountainBiking,
            "swim" => ActivityType::Swimming,
            "crosscountryskiing" | "xcskiing" => ActivityType::CrossCountrySkiing,
            "alpineskiing" => ActivityType::DownhillSkiing,
            _ => ActivityType::Unknown,
        }
    }

    /// `Activity@Sport` attribute of the distribution XML dialect
    pub fn from_tcx_sport(sport: &str) -> Self {
        match sport {
            "Running" => ActivityType::Running,
            "Biking" => ActivityType::Cycling,
            "Other" => ActivityType::Other,
            _ => ActivityType::from_name(sport),
        }
    }

    /// Sport name written to the distribution XML dialect
    pub fn tcx_sport(&self) -> &'static str {
        match self {
            ActivityType::Running
            | ActivityType::TrailRunning
            | ActivityType::TreadmillRunning
            | ActivityType::TrackRunning => "Running",
            ActivityType::Cycling
            | ActivityType::IndoorCycling
            | ActivityType::MountainBiking
            | ActivityType::GravelCycling
            | ActivityType::EBiking => "Biking",
            _ => "Other",
        }
    }

    /// Binary format `sport` / `sub_sport` enum names
    pub fn from_fit(sport: &str, sub_sport: Option<&str>) -> Self {
        match (sport, sub_sport.unwrap_or("generic")) {
            ("running", "trail") => ActivityType::TrailRunning,
            ("running", "treadmill") => ActivityType::TreadmillRunning,
            ("running", "track") | ("running", "indoor_running") => ActivityType::TrackRunning,
            ("running", _) => ActivityType::Running,
            ("cycling", "mountain") | ("cycling", "downhill") => ActivityType::MountainBiking,
            ("cycling", "indoor_cycling")
            | ("cycling", "spin")
            | ("cycling", "virtual_activity") => ActivityType::IndoorCycling,
            ("cycling", "gravel_cycling") | ("cycling", "cyclocross") => {
                ActivityType::GravelCycling
            }
            ("cycling", "e_bike_fitness") | ("cycling", "e_bike_mountain") => ActivityType::EBiking,
            ("cycling", _) => ActivityType::Cycling,
            ("e_biking", _) => ActivityType::EBiking,
            ("swimming", "lap_swimming") => ActivityType::PoolSwimming,
            ("swimming", "open_water") => ActivityType::OpenWaterSwimming,
            ("swimming", _) => ActivityType::Swimming,
            ("walking", _) => ActivityType::Walking,
            ("hiking", _) => ActivityType::Hiking,
            ("mountaineering", _) => ActivityType::Mountaineering,
            ("multisport", _) => ActivityType::Multisport,
            ("transition", _) => ActivityType::Transition,
            ("cross_country_skiing", "backcountry") => ActivityType::SkiTouring,
            ("cross_country_skiing", _) => ActivityType::CrossCountrySkiing,
            ("alpine_skiing", "backcountry") => ActivityType::SkiTouring,
            ("alpine_skiing", _) => ActivityType::DownhillSkiing,
            ("snowboarding", _) => ActivityType::Snowboarding,
            ("snowshoeing", _) => ActivityType::SnowShoeing,
            ("ice_skating", _) => ActivityType::IceSkating,
            ("inline_skating", _) => ActivityType::RollerSkating,
            ("rowing", "indoor_rowing") => ActivityType::IndoorRowing,
            ("rowing", _) => ActivityType::Rowing,
            ("paddling", _) => ActivityType::Paddling,
            ("kayaking", _) => ActivityType::Kayaking,
            ("stand_up_paddleboarding", _) => ActivityType::StandUpPaddling,
            ("sailing", _) => ActivityType::Sailing,
            ("surfing", _) => ActivityType::Surfing,
            ("kitesurfing", _) => ActivityType::Kitesurfing,
            ("rock_climbing", _) => ActivityType::Climbing,
            ("golf", _) => ActivityType::Golf,
            ("tennis", _) => ActivityType::Tennis,
            ("soccer", _) => ActivityType::Soccer,
            ("basketball", _) => ActivityType::Basketball,
            ("horseback_riding", _) => ActivityType::HorsebackRiding,
            ("motorcycling", _) | ("driving", _) => ActivityType::Motorsports,
            ("training", "strength_training") => ActivityType::StrengthTraining,
            ("training", "yoga") => ActivityType::Yoga,
            ("training", "elliptical") | ("fitness_equipment", "elliptical") => {
                ActivityType::Elliptical
            }
            ("training", _) => ActivityType::Gym,
            ("fitness_equipment", "indoor_rowing") => ActivityType::IndoorRowing,
            ("fitness_equipment", "treadmill") => ActivityType::TreadmillRunning,
            ("fitness_equipment", "indoor_cycling") => ActivityType::IndoorCycling,
            ("fitness_equipment", _) => ActivityType::Gym,
            ("generic", _) => ActivityType::Other,
            _ => ActivityType::Unknown,
        }
    }

    /// Numeric activity codes used by the device JSON dialects
    pub fn from_device_code(code: i64) -> Self {
        match code {
            0 => ActivityType::Walking,
            1 => ActivityType::Running,
            2 => ActivityType::Cycling,
            3 => ActivityType::CrossCountrySkiing,
            4..=9 => ActivityType::Other,
            10 => ActivityType::MountainBiking,
            11 => ActivityType::Hiking,
            12 => ActivityType::RollerSkating,
            13 => ActivityType::DownhillSkiing,
            14 => ActivityType::Paddling,
            15 => ActivityType::Rowing,
            16 => ActivityType::Golf,
            17 => ActivityType::Gym,
            18 => ActivityType::Parkour,
            19 => ActivityType::BallGames,
            20 => ActivityType::Gym,
            21 => ActivityType::PoolSwimming,
            22 => ActivityType::TrailRunning,
            23 => ActivityType::StrengthTraining,
            24 => ActivityType::NordicWalking,
            25 => ActivityType::HorsebackRiding,
            26 => ActivityType::Motorsports,
            27 => ActivityType::Skateboarding,
            28 => ActivityType::Surfing,
            29 => ActivityType::Climbing,
            30 => ActivityType::Snowboarding,
            31 => ActivityType::SkiTouring,
            32 => ActivityType::FitnessClass,
            33 => ActivityType::Soccer,
            34 => ActivityType::Tennis,
            35 => ActivityType::Basketball,
            36 => ActivityType::Orienteering,
            37 => ActivityType::Yoga,
            38 => ActivityType::Sailing,
            39 => ActivityType::Kayaking,
            40 => ActivityType::Mountaineering,
            41 => ActivityType::IceSkating,
            42 => ActivityType::OpenWaterSwimming,
            43 => ActivityType::Triathlon,
            44 => ActivityType::Kitesurfing,
            45 => ActivityType::StandUpPaddling,
            46 => ActivityType::SnowShoeing,
            47 => ActivityType::Elliptical,
            48 => ActivityType::IndoorRowing,
            49 => ActivityType::TreadmillRunning,
            50 => ActivityType::TrackRunning,
            51 => ActivityType::IndoorCycling,
            52 => ActivityType::GravelCycling,
            53 => ActivityType::EBiking,
            54 => ActivityType::Multisport,
            55 => ActivityType::Transition,
            _ => ActivityType::Unknown,
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl Default for ActivityType {
    fn default() -> Self {
        ActivityType::Unknown
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_resolve() {
        for activity_type in ActivityType::ALL {
            assert_eq!(ActivityType::from_name(activity_type.display_name()), activity_type);
        }
    }

    #[test]
    fn test_loose_names() {
        assert_eq!(ActivityType::from_name("trail_running"), ActivityType::TrailRunning);
        assert_eq!(ActivityType::from_name("MOUNTAIN BIKING"), ActivityType::MountainBiking);
        assert_eq!(ActivityType::from_name("ride"), ActivityType::Cycling);
        assert_eq!(ActivityType::from_name("underwater hockey"), ActivityType::Unknown);
        assert_eq!(ActivityType::from_name(""), ActivityType::Unknown);
    }

    #[test]
    fn test_fit_mapping() {
        assert_eq!(ActivityType::from_fit("running", Some("trail")), ActivityType::TrailRunning);
        assert_eq!(ActivityType::from_fit("cycling", None), ActivityType::Cycling);
        assert_eq!(ActivityType::from_fit("swimming", Some("lap_swimming")), ActivityType::PoolSwimming);
        assert_eq!(ActivityType::from_fit("unknown_sport_253", None), ActivityType::Unknown);
    }

    #[test]
    fn test_device_codes() {
        assert_eq!(ActivityType::from_device_code(1), ActivityType::Running);
        assert_eq!(ActivityType::from_device_code(22), ActivityType::TrailRunning);
        assert_eq!(ActivityType::from_device_code(999), ActivityType::Unknown);
        assert_eq!(ActivityType::from_device_code(-1), ActivityType::Unknown);
    }

    #[test]
    fn test_tcx_sport() {
        assert_eq!(ActivityType::from_tcx_sport("Biking"), ActivityType::Cycling);
        assert_eq!(ActivityType::MountainBiking.tcx_sport(), "Biking");
        assert_eq!(ActivityType::Yoga.tcx_sport(), "Other");
    }
}
