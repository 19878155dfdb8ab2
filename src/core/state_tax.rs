use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Work or retirement state, District of Columbia included.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StateCode {
    Ak,
    Al,
    Ar,
    Az,
    Ca,
    Co,
    Ct,
    Dc,
    De,
    Fl,
    Ga,
    Hi,
    Ia,
    Id,
    Il,
    In,
    Ks,
    Ky,
    La,
    Ma,
    Md,
    Me,
    Mi,
    Mn,
    Mo,
    Ms,
    Mt,
    Nc,
    Nd,
    Ne,
    Nh,
    Nj,
    Nm,
    Nv,
    Ny,
    Oh,
    Ok,
    Or,
    Pa,
    Ri,
    Sc,
    Sd,
    Tn,
    Tx,
    Ut,
    Va,
    Vt,
    Wa,
    Wi,
    Wv,
    Wy,
}

impl StateCode {
    pub const ALL: [StateCode; 51] = [
        StateCode::Ak,
        StateCode::Al,
        StateCode::Ar,
        StateCode::Az,
        StateCode::Ca,
        StateCode::Co,
        StateCode::Ct,
        StateCode::Dc,
        StateCode::De,
        StateCode::Fl,
        StateCode::Ga,
        StateCode::Hi,
        StateCode::Ia,
        StateCode::Id,
        StateCode::Il,
        StateCode::In,
        StateCode::Ks,
        StateCode::Ky,
        StateCode::La,
        StateCode::Ma,
        StateCode::Md,
        StateCode::Me,
        StateCode::Mi,
        StateCode::Mn,
        StateCode::Mo,
        StateCode::Ms,
        StateCode::Mt,
        StateCode::Nc,
        StateCode::Nd,
        StateCode::Ne,
        StateCode::Nh,
        StateCode::Nj,
        StateCode::Nm,
        StateCode::Nv,
        StateCode::Ny,
        StateCode::Oh,
        StateCode::Ok,
        StateCode::Or,
        StateCode::Pa,
        StateCode::Ri,
        StateCode::Sc,
        StateCode::Sd,
        StateCode::Tn,
        StateCode::Tx,
        StateCode::Ut,
        StateCode::Va,
        StateCode::Vt,
        StateCode::Wa,
        StateCode::Wi,
        StateCode::Wv,
        StateCode::Wy,
    ];

    pub fn code(self) -> &'static str {
        match self {
            StateCode::Ak => "AK",
            StateCode::Al => "AL",
            StateCode::Ar => "AR",
            StateCode::Az => "AZ",
            StateCode::Ca => "CA",
            StateCode::Co => "CO",
            StateCode::Ct => "CT",
            StateCode::Dc => "DC",
            StateCode::De => "DE",
            StateCode::Fl => "FL",
            StateCode::Ga => "GA",
            StateCode::Hi => "HI",
            StateCode::Ia => "IA",
            StateCode::Id => "ID",
            StateCode::Il => "IL",
            StateCode::In => "IN",
            StateCode::Ks => "KS",
            StateCode::Ky => "KY",
            StateCode::La => "LA",
            StateCode::Ma => "MA",
            StateCode::Md => "MD",
            StateCode::Me => "ME",
            StateCode::Mi => "MI",
            StateCode::Mn => "MN",
            StateCode::Mo => "MO",
            StateCode::Ms => "MS",
            StateCode::Mt => "MT",
            StateCode::Nc => "NC",
            StateCode::Nd => "ND",
            StateCode::Ne => "NE",
            StateCode::Nh => "NH",
            StateCode::Nj => "NJ",
            StateCode::Nm => "NM",
            StateCode::Nv => "NV",
            StateCode::Ny => "NY",
            StateCode::Oh => "OH",
            StateCode::Ok => "OK",
            StateCode::Or => "OR",
            StateCode::Pa => "PA",
            StateCode::Ri => "RI",
            StateCode::Sc => "SC",
            StateCode::Sd => "SD",
            StateCode::Tn => "TN",
            StateCode::Tx => "TX",
            StateCode::Ut => "UT",
            StateCode::Va => "VA",
            StateCode::Vt => "VT",
            StateCode::Wa => "WA",
            StateCode::Wi => "WI",
            StateCode::Wv => "WV",
            StateCode::Wy => "WY",
        }
    }

    pub fn has_income_tax(self) -> bool {
        table_for(self).is_some()
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StateCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        StateCode::ALL
            .into_iter()
            .find(|state| state.code() == upper)
            .ok_or_else(|| format!("unsupported state code '{s}'"))
    }
}

#[derive(Copy, Clone, Debug)]
enum Exemption {
    Deduction(f64),
    Credit(f64),
}

type Bracket = (f64, f64, f64);

struct StateTable {
    deduction_single: f64,
    deduction_married: f64,
    personal: Exemption,
    dependent: Exemption,
    single: &'static [Bracket],
    married: &'static [Bracket],
}

const ALABAMA: StateTable = StateTable {
    deduction_single: 2_500.0,
    deduction_married: 7_500.0,
    personal: Exemption::Deduction(1_500.0),
    dependent: Exemption::Deduction(1_000.0),
    single: &[
        (0.0, 0.0, 0.02),
        (500.0, 10.0, 0.04),
        (3_000.0, 110.0, 0.05),
    ],
    married: &[
        (0.0, 0.0, 0.02),
        (1_000.0, 20.0, 0.04),
        (6_000.0, 220.0, 0.05),
    ],
};

const ARKANSAS_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.02),
    (4_000.0, 80.0, 0.04),
    (8_000.0, 240.0, 0.059),
    (79_300.0, 4_446.7, 0.066),
];

const ARKANSAS: StateTable = StateTable {
    deduction_single: 2_200.0,
    deduction_married: 4_400.0,
    personal: Exemption::Credit(26.0),
    dependent: Exemption::Credit(26.0),
    single: ARKANSAS_BRACKETS,
    married: ARKANSAS_BRACKETS,
};

const ARIZONA: StateTable = StateTable {
    deduction_single: 5_312.0,
    deduction_married: 10_613.0,
    personal: Exemption::Deduction(2_200.0),
    dependent: Exemption::Deduction(2_300.0),
    single: &[
        (0.0, 0.0, 0.0259),
        (26_500.0, 686.35, 0.0334),
        (53_000.0, 1_571.45, 0.0417),
        (159_000.0, 5_991.65, 0.045),
    ],
    married: &[
        (0.0, 0.0, 0.0259),
        (53_000.0, 1_372.7, 0.0334),
        (106_000.0, 3_142.9, 0.0417),
        (318_000.0, 11_983.3, 0.045),
    ],
};

const CALIFORNIA: StateTable = StateTable {
    deduction_single: 4_236.0,
    deduction_married: 8_472.0,
    personal: Exemption::Credit(114.0),
    dependent: Exemption::Credit(353.0),
    single: &[
        (0.0, 0.0, 0.01),
        (8_809.0, 88.09, 0.02),
        (20_883.0, 329.57, 0.04),
        (32_960.0, 812.65, 0.06),
        (45_753.0, 1_580.23, 0.08),
        (57_824.0, 2_545.91, 0.093),
        (295_373.0, 24_637.97, 0.103),
        (354_445.0, 30_722.38, 0.113),
        (590_742.0, 57_423.94, 0.123),
        (1_000_000.0, 107_762.68, 0.133),
    ],
    married: &[
        (0.0, 0.0, 0.01),
        (17_618.0, 176.18, 0.02),
        (41_766.0, 659.14, 0.04),
        (65_920.0, 1_625.3, 0.06),
        (91_506.0, 3_160.46, 0.08),
        (115_648.0, 5_091.82, 0.093),
        (590_746.0, 49_275.93, 0.103),
        (708_890.0, 61_444.77, 0.113),
        (1_000_000.0, 94_340.2, 0.123),
        (1_181_484.0, 116_662.73, 0.133),
    ],
};

const COLORADO_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0463),
];

const COLORADO: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(0.0),
    single: COLORADO_BRACKETS,
    married: COLORADO_BRACKETS,
};

const CONNECTICUT: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(15_000.0),
    dependent: Exemption::Deduction(0.0),
    single: &[
        (0.0, 0.0, 0.03),
        (10_000.0, 300.0, 0.05),
        (50_000.0, 2_300.0, 0.055),
        (100_000.0, 5_050.0, 0.06),
        (200_000.0, 11_050.0, 0.065),
        (250_000.0, 14_300.0, 0.069),
        (500_000.0, 31_550.0, 0.0699),
    ],
    married: &[
        (0.0, 0.0, 0.03),
        (20_000.0, 600.0, 0.05),
        (100_000.0, 4_600.0, 0.055),
        (200_000.0, 10_100.0, 0.06),
        (400_000.0, 22_100.0, 0.065),
        (500_000.0, 28_600.0, 0.069),
        (1_000_000.0, 63_100.0, 0.0699),
    ],
};

const DISTRICT_OF_COLUMBIA_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.04),
    (10_000.0, 400.0, 0.06),
    (40_000.0, 2_200.0, 0.065),
    (60_000.0, 3_500.0, 0.085),
    (350_000.0, 28_150.0, 0.0875),
    (1_000_000.0, 85_025.0, 0.0895),
];

const DISTRICT_OF_COLUMBIA: StateTable = StateTable {
    deduction_single: 12_000.0,
    deduction_married: 24_000.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(0.0),
    single: DISTRICT_OF_COLUMBIA_BRACKETS,
    married: DISTRICT_OF_COLUMBIA_BRACKETS,
};

const DELAWARE_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0),
    (2_000.0, 0.0, 0.022),
    (5_000.0, 66.0, 0.039),
    (10_000.0, 261.0, 0.048),
    (20_000.0, 741.0, 0.052),
    (25_000.0, 1_001.0, 0.0555),
    (60_000.0, 2_943.5, 0.066),
];

const DELAWARE: StateTable = StateTable {
    deduction_single: 3_250.0,
    deduction_married: 6_500.0,
    personal: Exemption::Credit(110.0),
    dependent: Exemption::Credit(110.0),
    single: DELAWARE_BRACKETS,
    married: DELAWARE_BRACKETS,
};

const GEORGIA: StateTable = StateTable {
    deduction_single: 4_600.0,
    deduction_married: 6_000.0,
    personal: Exemption::Deduction(2_700.0),
    dependent: Exemption::Deduction(3_000.0),
    single: &[
        (0.0, 0.0, 0.01),
        (750.0, 7.5, 0.02),
        (2_250.0, 37.5, 0.03),
        (3_750.0, 82.5, 0.04),
        (5_250.0, 142.5, 0.05),
        (7_000.0, 230.0, 0.0575),
    ],
    married: &[
        (0.0, 0.0, 0.01),
        (1_000.0, 10.0, 0.02),
        (3_000.0, 50.0, 0.03),
        (5_000.0, 110.0, 0.04),
        (7_000.0, 190.0, 0.05),
        (10_000.0, 340.0, 0.0575),
    ],
};

const HAWAII: StateTable = StateTable {
    deduction_single: 2_200.0,
    deduction_married: 4_400.0,
    personal: Exemption::Deduction(1_144.0),
    dependent: Exemption::Deduction(1_144.0),
    single: &[
        (0.0, 0.0, 0.014),
        (2_400.0, 33.6, 0.032),
        (4_800.0, 110.4, 0.055),
        (9_600.0, 374.4, 0.064),
        (14_400.0, 681.6, 0.068),
        (19_200.0, 1_008.0, 0.072),
        (24_000.0, 1_353.6, 0.076),
        (36_000.0, 2_265.6, 0.079),
        (48_000.0, 3_213.6, 0.0825),
        (150_000.0, 11_628.6, 0.09),
        (175_000.0, 13_878.6, 0.1),
        (200_000.0, 16_378.6, 0.11),
    ],
    married: &[
        (0.0, 0.0, 0.014),
        (4_800.0, 67.2, 0.032),
        (9_600.0, 220.8, 0.055),
        (19_200.0, 748.8, 0.064),
        (28_800.0, 1_363.2, 0.068),
        (38_400.0, 2_016.0, 0.072),
        (48_000.0, 2_707.2, 0.076),
        (72_000.0, 4_531.2, 0.079),
        (96_000.0, 6_427.2, 0.0825),
        (300_000.0, 23_257.2, 0.09),
        (350_000.0, 27_757.2, 0.1),
        (400_000.0, 32_757.2, 0.11),
    ],
};

const IOWA_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0033),
    (1_638.0, 5.41, 0.0067),
    (3_276.0, 16.38, 0.0225),
    (6_552.0, 90.09, 0.0414),
    (14_742.0, 429.16, 0.0563),
    (24_570.0, 982.47, 0.0596),
    (32_760.0, 1_470.6, 0.0625),
    (49_140.0, 2_494.35, 0.0744),
    (73_710.0, 4_322.35, 0.0853),
];

const IOWA: StateTable = StateTable {
    deduction_single: 2_030.0,
    deduction_married: 5_000.0,
    personal: Exemption::Credit(40.0),
    dependent: Exemption::Credit(40.0),
    single: IOWA_BRACKETS,
    married: IOWA_BRACKETS,
};

const IDAHO: StateTable = StateTable {
    deduction_single: 12_000.0,
    deduction_married: 24_000.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(0.0),
    single: &[
        (0.0, 0.0, 0.0113),
        (1_541.0, 17.34, 0.0313),
        (3_081.0, 64.46, 0.0363),
        (4_622.0, 121.32, 0.0463),
        (6_162.0, 192.55, 0.0563),
        (7_703.0, 279.23, 0.0663),
        (11_554.0, 534.36, 0.0693),
    ],
    married: &[
        (0.0, 0.0, 0.0113),
        (3_082.0, 34.67, 0.0313),
        (6_162.0, 130.92, 0.0363),
        (9_244.0, 242.65, 0.0463),
        (12_324.0, 385.1, 0.0563),
        (15_406.0, 558.46, 0.0663),
        (23_108.0, 1_068.72, 0.0693),
    ],
};

const ILLINOIS_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0495),
];

const ILLINOIS: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(2_000.0),
    dependent: Exemption::Deduction(2_000.0),
    single: ILLINOIS_BRACKETS,
    married: ILLINOIS_BRACKETS,
};

const INDIANA_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0323),
];

const INDIANA: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(1_000.0),
    dependent: Exemption::Deduction(1_000.0),
    single: INDIANA_BRACKETS,
    married: INDIANA_BRACKETS,
};

const KANSAS: StateTable = StateTable {
    deduction_single: 3_000.0,
    deduction_married: 7_500.0,
    personal: Exemption::Deduction(2_250.0),
    dependent: Exemption::Deduction(2_250.0),
    single: &[
        (0.0, 0.0, 0.031),
        (15_000.0, 465.0, 0.0525),
        (30_000.0, 1_252.5, 0.057),
    ],
    married: &[
        (0.0, 0.0, 0.031),
        (30_000.0, 930.0, 0.0525),
        (60_000.0, 2_505.0, 0.057),
    ],
};

const KENTUCKY_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.05),
];

const KENTUCKY: StateTable = StateTable {
    deduction_single: 2_530.0,
    deduction_married: 2_530.0,
    personal: Exemption::Credit(0.0),
    dependent: Exemption::Credit(0.0),
    single: KENTUCKY_BRACKETS,
    married: KENTUCKY_BRACKETS,
};

const LOUISIANA_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.02),
    (12_500.0, 250.0, 0.04),
    (50_000.0, 1_750.0, 0.06),
];

const LOUISIANA: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(4_500.0),
    dependent: Exemption::Deduction(1_000.0),
    single: LOUISIANA_BRACKETS,
    married: LOUISIANA_BRACKETS,
};

const MASSACHUSETTS_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.05),
];

const MASSACHUSETTS: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(4_400.0),
    dependent: Exemption::Deduction(1_000.0),
    single: MASSACHUSETTS_BRACKETS,
    married: MASSACHUSETTS_BRACKETS,
};

const MARYLAND: StateTable = StateTable {
    deduction_single: 2_000.0,
    deduction_married: 4_000.0,
    personal: Exemption::Deduction(3_200.0),
    dependent: Exemption::Deduction(3_200.0),
    single: &[
        (0.0, 0.0, 0.02),
        (1_000.0, 20.0, 0.03),
        (2_000.0, 50.0, 0.04),
        (3_000.0, 90.0, 0.0475),
        (100_000.0, 4_697.5, 0.05),
        (125_000.0, 5_947.5, 0.0525),
        (150_000.0, 7_260.0, 0.055),
        (250_000.0, 12_760.0, 0.0575),
    ],
    married: &[
        (0.0, 0.0, 0.02),
        (1_000.0, 20.0, 0.03),
        (2_000.0, 50.0, 0.04),
        (3_000.0, 90.0, 0.0475),
        (150_000.0, 7_072.5, 0.05),
        (175_000.0, 8_322.5, 0.0525),
        (225_000.0, 10_947.5, 0.055),
        (300_000.0, 15_072.5, 0.0575),
    ],
};

const MAINE: StateTable = StateTable {
    deduction_single: 11_800.0,
    deduction_married: 23_600.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(0.0),
    single: &[
        (0.0, 0.0, 0.058),
        (22_200.0, 1_287.6, 0.0675),
        (52_600.0, 3_339.6, 0.0715),
    ],
    married: &[
        (0.0, 0.0, 0.058),
        (44_450.0, 2_578.1, 0.0675),
        (105_200.0, 6_678.73, 0.0715),
    ],
};

const MICHIGAN_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0425),
];

const MICHIGAN: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(4_050.0),
    dependent: Exemption::Deduction(0.0),
    single: MICHIGAN_BRACKETS,
    married: MICHIGAN_BRACKETS,
};

const MINNESOTA: StateTable = StateTable {
    deduction_single: 6_500.0,
    deduction_married: 13_000.0,
    personal: Exemption::Deduction(4_150.0),
    dependent: Exemption::Deduction(4_150.0),
    single: &[
        (0.0, 0.0, 0.0535),
        (26_960.0, 1_442.36, 0.068),
        (88_550.0, 5_630.48, 0.0785),
        (164_400.0, 11_584.71, 0.0985),
    ],
    married: &[
        (0.0, 0.0, 0.0535),
        (39_410.0, 2_108.44, 0.068),
        (156_570.0, 10_075.32, 0.0785),
        (273_470.0, 19_251.97, 0.0985),
    ],
};

const MISSOURI_BRACKETS: &[Bracket] = &[
    (105.0, 0.0, 0.015),
    (1_053.0, 14.22, 0.02),
    (2_106.0, 35.28, 0.025),
    (3_159.0, 61.61, 0.03),
    (4_212.0, 93.2, 0.035),
    (5_265.0, 130.05, 0.04),
    (6_318.0, 172.17, 0.045),
    (7_371.0, 219.56, 0.05),
    (8_424.0, 272.21, 0.054),
];

const MISSOURI: StateTable = StateTable {
    deduction_single: 12_000.0,
    deduction_married: 24_000.0,
    personal: Exemption::Deduction(2_100.0),
    dependent: Exemption::Deduction(1_200.0),
    single: MISSOURI_BRACKETS,
    married: MISSOURI_BRACKETS,
};

const MISSISSIPPI_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0),
    (1_000.0, 0.0, 0.03),
    (5_000.0, 120.0, 0.04),
    (10_000.0, 320.0, 0.05),
];

const MISSISSIPPI: StateTable = StateTable {
    deduction_single: 2_300.0,
    deduction_married: 4_600.0,
    personal: Exemption::Deduction(6_000.0),
    dependent: Exemption::Deduction(1_500.0),
    single: MISSISSIPPI_BRACKETS,
    married: MISSISSIPPI_BRACKETS,
};

const MONTANA_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.01),
    (3_100.0, 31.0, 0.02),
    (5_400.0, 77.0, 0.03),
    (8_200.0, 161.0, 0.04),
    (11_100.0, 277.0, 0.05),
    (14_300.0, 437.0, 0.06),
    (18_400.0, 683.0, 0.069),
];

const MONTANA: StateTable = StateTable {
    deduction_single: 4_580.0,
    deduction_married: 9_160.0,
    personal: Exemption::Deduction(2_440.0),
    dependent: Exemption::Deduction(2_440.0),
    single: MONTANA_BRACKETS,
    married: MONTANA_BRACKETS,
};

const NORTH_CAROLINA_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0525),
];

const NORTH_CAROLINA: StateTable = StateTable {
    deduction_single: 8_750.0,
    deduction_married: 17_500.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(0.0),
    single: NORTH_CAROLINA_BRACKETS,
    married: NORTH_CAROLINA_BRACKETS,
};

const NORTH_DAKOTA: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(0.0),
    single: &[
        (0.0, 0.0, 0.011),
        (39_450.0, 433.95, 0.0204),
        (95_500.0, 1_577.37, 0.0227),
        (199_250.0, 3_932.5, 0.0264),
        (433_200.0, 10_108.78, 0.029),
    ],
    married: &[
        (0.0, 0.0, 0.011),
        (65_900.0, 724.9, 0.0204),
        (159_200.0, 2_628.22, 0.0227),
        (242_550.0, 4_520.27, 0.0264),
        (433_200.0, 9_553.43, 0.029),
    ],
};

const NEBRASKA: StateTable = StateTable {
    deduction_single: 6_500.0,
    deduction_married: 13_000.0,
    personal: Exemption::Credit(134.0),
    dependent: Exemption::Credit(134.0),
    single: &[
        (0.0, 0.0, 0.0246),
        (3_230.0, 79.46, 0.0351),
        (19_330.0, 644.57, 0.0501),
        (31_160.0, 1_237.25, 0.0684),
    ],
    married: &[
        (0.0, 0.0, 0.0246),
        (6_440.0, 158.42, 0.0351),
        (38_680.0, 1_290.05, 0.0501),
        (62_320.0, 2_474.41, 0.0684),
    ],
};

const NEW_HAMPSHIRE_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.05),
];

const NEW_HAMPSHIRE: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(2_400.0),
    dependent: Exemption::Deduction(0.0),
    single: NEW_HAMPSHIRE_BRACKETS,
    married: NEW_HAMPSHIRE_BRACKETS,
};

const NEW_JERSEY: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(1_000.0),
    dependent: Exemption::Deduction(1_500.0),
    single: &[
        (0.0, 0.0, 0.014),
        (20_000.0, 280.0, 0.0175),
        (35_000.0, 542.5, 0.035),
        (40_000.0, 717.5, 0.0553),
        (75_000.0, 2_651.25, 0.0637),
        (500_000.0, 29_723.75, 0.0897),
        (5_000_000.0, 433_373.75, 0.1075),
    ],
    married: &[
        (0.0, 0.0, 0.014),
        (20_000.0, 280.0, 0.0175),
        (50_000.0, 805.0, 0.0245),
        (70_000.0, 1_295.0, 0.035),
        (80_000.0, 1_645.0, 0.05525),
        (150_000.0, 5_512.5, 0.0637),
        (500_000.0, 27_807.5, 0.0897),
        (5_000_000.0, 431_457.5, 0.1075),
    ],
};

const NEW_MEXICO: StateTable = StateTable {
    deduction_single: 12_000.0,
    deduction_married: 24_000.0,
    personal: Exemption::Deduction(4_050.0),
    dependent: Exemption::Deduction(4_050.0),
    single: &[
        (0.0, 0.0, 0.017),
        (5_500.0, 93.5, 0.032),
        (11_000.0, 269.5, 0.047),
        (16_000.0, 504.5, 0.049),
    ],
    married: &[
        (0.0, 0.0, 0.017),
        (8_000.0, 136.0, 0.032),
        (16_000.0, 392.0, 0.047),
        (24_000.0, 768.0, 0.049),
    ],
};

const NEW_YORK: StateTable = StateTable {
    deduction_single: 8_000.0,
    deduction_married: 16_050.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(1_000.0),
    single: &[
        (0.0, 0.0, 0.04),
        (8_500.0, 340.0, 0.045),
        (11_700.0, 484.0, 0.0525),
        (13_900.0, 599.5, 0.059),
        (21_400.0, 1_042.0, 0.0621),
        (80_650.0, 4_721.43, 0.0649),
        (215_400.0, 13_466.7, 0.0685),
        (1_077_550.0, 72_523.98, 0.0882),
    ],
    married: &[
        (0.0, 0.0, 0.04),
        (17_150.0, 686.0, 0.045),
        (23_600.0, 976.25, 0.0525),
        (27_900.0, 1_202.0, 0.059),
        (43_000.0, 2_092.9, 0.0609),
        (161_550.0, 9_312.6, 0.0641),
        (323_200.0, 19_674.37, 0.0685),
        (2_155_350.0, 145_176.64, 0.0882),
    ],
};

const OHIO_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0),
    (21_750.0, 0.0, 0.0285),
    (43_450.0, 618.45, 0.0333),
    (86_900.0, 2_063.6, 0.038),
    (108_700.0, 2_892.43, 0.0441),
    (217_400.0, 7_689.36, 0.048),
];

const OHIO: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(2_350.0),
    dependent: Exemption::Deduction(2_350.0),
    single: OHIO_BRACKETS,
    married: OHIO_BRACKETS,
};

const OKLAHOMA: StateTable = StateTable {
    deduction_single: 6_350.0,
    deduction_married: 12_700.0,
    personal: Exemption::Deduction(1_000.0),
    dependent: Exemption::Deduction(1_000.0),
    single: &[
        (0.0, 0.0, 0.005),
        (1_000.0, 5.0, 0.01),
        (2_500.0, 20.0, 0.02),
        (3_750.0, 45.0, 0.03),
        (4_900.0, 79.5, 0.04),
        (7_200.0, 171.5, 0.05),
    ],
    married: &[
        (0.0, 0.0, 0.005),
        (2_000.0, 10.0, 0.01),
        (5_000.0, 40.0, 0.02),
        (7_500.0, 90.0, 0.03),
        (9_800.0, 159.0, 0.04),
        (12_200.0, 255.0, 0.05),
    ],
};

const OREGON: StateTable = StateTable {
    deduction_single: 2_215.0,
    deduction_married: 4_430.0,
    personal: Exemption::Credit(201.0),
    dependent: Exemption::Credit(201.0),
    single: &[
        (0.0, 0.0, 0.05),
        (3_550.0, 177.5, 0.07),
        (8_900.0, 552.0, 0.09),
        (125_000.0, 11_001.0, 0.099),
    ],
    married: &[
        (0.0, 0.0, 0.05),
        (7_100.0, 355.0, 0.07),
        (17_800.0, 1_104.0, 0.09),
        (250_000.0, 22_002.0, 0.099),
    ],
};

const PENNSYLVANIA_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0307),
];

const PENNSYLVANIA: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(0.0),
    single: PENNSYLVANIA_BRACKETS,
    married: PENNSYLVANIA_BRACKETS,
};

const RHODE_ISLAND_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0375),
    (65_250.0, 2_446.88, 0.0475),
    (148_350.0, 6_394.13, 0.0599),
];

const RHODE_ISLAND: StateTable = StateTable {
    deduction_single: 8_525.0,
    deduction_married: 17_050.0,
    personal: Exemption::Deduction(4_000.0),
    dependent: Exemption::Deduction(4_000.0),
    single: RHODE_ISLAND_BRACKETS,
    married: RHODE_ISLAND_BRACKETS,
};

const SOUTH_CAROLINA_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0),
    (3_070.0, 0.0, 0.03),
    (6_150.0, 92.4, 0.04),
    (9_230.0, 215.6, 0.05),
    (12_310.0, 369.6, 0.06),
    (15_400.0, 555.0, 0.07),
];

const SOUTH_CAROLINA: StateTable = StateTable {
    deduction_single: 12_000.0,
    deduction_married: 24_000.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(0.0),
    single: SOUTH_CAROLINA_BRACKETS,
    married: SOUTH_CAROLINA_BRACKETS,
};

const TENNESSEE_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.01),
];

const TENNESSEE: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(1_250.0),
    dependent: Exemption::Deduction(0.0),
    single: TENNESSEE_BRACKETS,
    married: TENNESSEE_BRACKETS,
};

const UTAH_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.0495),
];

const UTAH: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(0.0),
    single: UTAH_BRACKETS,
    married: UTAH_BRACKETS,
};

const VIRGINIA_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.02),
    (3_000.0, 60.0, 0.03),
    (5_000.0, 120.0, 0.05),
    (17_000.0, 720.0, 0.0575),
];

const VIRGINIA: StateTable = StateTable {
    deduction_single: 3_000.0,
    deduction_married: 6_000.0,
    personal: Exemption::Deduction(930.0),
    dependent: Exemption::Deduction(930.0),
    single: VIRGINIA_BRACKETS,
    married: VIRGINIA_BRACKETS,
};

const VERMONT: StateTable = StateTable {
    deduction_single: 12_000.0,
    deduction_married: 24_000.0,
    personal: Exemption::Deduction(0.0),
    dependent: Exemption::Deduction(0.0),
    single: &[
        (0.0, 0.0, 0.0335),
        (39_600.0, 1_326.6, 0.066),
        (96_000.0, 5_049.0, 0.076),
        (200_200.0, 12_968.2, 0.0875),
    ],
    married: &[
        (0.0, 0.0, 0.0335),
        (66_150.0, 2_216.03, 0.066),
        (159_950.0, 8_406.83, 0.076),
        (243_750.0, 14_775.63, 0.0875),
    ],
};

const WISCONSIN: StateTable = StateTable {
    deduction_single: 10_580.0,
    deduction_married: 19_580.0,
    personal: Exemption::Deduction(700.0),
    dependent: Exemption::Deduction(700.0),
    single: &[
        (0.0, 0.0, 0.04),
        (11_970.0, 478.8, 0.0521),
        (23_930.0, 1_101.92, 0.0627),
        (263_480.0, 16_121.7, 0.0765),
    ],
    married: &[
        (0.0, 0.0, 0.04),
        (15_960.0, 638.4, 0.0521),
        (31_910.0, 1_469.4, 0.0627),
        (351_310.0, 21_495.78, 0.0765),
    ],
};

const WEST_VIRGINIA_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.03),
    (10_000.0, 300.0, 0.04),
    (25_000.0, 900.0, 0.045),
    (40_000.0, 1_575.0, 0.06),
    (60_000.0, 2_775.0, 0.065),
];

const WEST_VIRGINIA: StateTable = StateTable {
    deduction_single: 0.0,
    deduction_married: 0.0,
    personal: Exemption::Deduction(2_000.0),
    dependent: Exemption::Deduction(2_000.0),
    single: WEST_VIRGINIA_BRACKETS,
    married: WEST_VIRGINIA_BRACKETS,
};

fn table_for(state: StateCode) -> Option<&'static StateTable> {
    match state {
        StateCode::Ak
        | StateCode::Fl
        | StateCode::Nv
        | StateCode::Sd
        | StateCode::Tx
        | StateCode::Wa
        | StateCode::Wy => None,
        StateCode::Al => Some(&ALABAMA),
        StateCode::Ar => Some(&ARKANSAS),
        StateCode::Az => Some(&ARIZONA),
        StateCode::Ca => Some(&CALIFORNIA),
        StateCode::Co => Some(&COLORADO),
        StateCode::Ct => Some(&CONNECTICUT),
        StateCode::Dc => Some(&DISTRICT_OF_COLUMBIA),
        StateCode::De => Some(&DELAWARE),
        StateCode::Ga => Some(&GEORGIA),
        StateCode::Hi => Some(&HAWAII),
        StateCode::Ia => Some(&IOWA),
        StateCode::Id => Some(&IDAHO),
        StateCode::Il => Some(&ILLINOIS),
        StateCode::In => Some(&INDIANA),
        StateCode::Ks => Some(&KANSAS),
        StateCode::Ky => Some(&KENTUCKY),
        StateCode::La => Some(&LOUISIANA),
        StateCode::Ma => Some(&MASSACHUSETTS),
        StateCode::Md => Some(&MARYLAND),
        StateCode::Me => Some(&MAINE),
        StateCode::Mi => Some(&MICHIGAN),
        StateCode::Mn => Some(&MINNESOTA),
        StateCode::Mo => Some(&MISSOURI),
        StateCode::Ms => Some(&MISSISSIPPI),
        StateCode::Mt => Some(&MONTANA),
        StateCode::Nc => Some(&NORTH_CAROLINA),
        StateCode::Nd => Some(&NORTH_DAKOTA),
        StateCode::Ne => Some(&NEBRASKA),
        StateCode::Nh => Some(&NEW_HAMPSHIRE),
        StateCode::Nj => Some(&NEW_JERSEY),
        StateCode::Nm => Some(&NEW_MEXICO),
        StateCode::Ny => Some(&NEW_YORK),
        StateCode::Oh => Some(&OHIO),
        StateCode::Ok => Some(&OKLAHOMA),
        StateCode::Or => Some(&OREGON),
        StateCode::Pa => Some(&PENNSYLVANIA),
        StateCode::Ri => Some(&RHODE_ISLAND),
        StateCode::Sc => Some(&SOUTH_CAROLINA),
        StateCode::Tn => Some(&TENNESSEE),
        StateCode::Ut => Some(&UTAH),
        StateCode::Va => Some(&VIRGINIA),
        StateCode::Vt => Some(&VERMONT),
        StateCode::Wi => Some(&WISCONSIN),
        StateCode::Wv => Some(&WEST_VIRGINIA),
    }
}

/// Tax on a cumulative bracket table of `(floor, base_tax, rate)` rows.
pub(crate) fn bracket_tax(brackets: &[Bracket], taxable_income: f64) -> f64 {
    brackets
        .iter()
        .rev()
        .find(|(floor, _, _)| taxable_income > *floor)
        .map(|(floor, base, rate)| base + (taxable_income - floor) * rate)
        .unwrap_or(0.0)
}

pub(crate) fn state_income_tax(income: f64, married: bool, state: StateCode, dependents: u32) -> f64 {
    let Some(table) = table_for(state) else {
        return 0.0;
    };
    if income <= 0.0 {
        return 0.0;
    }

    let (deduction, brackets) = if married {
        (table.deduction_married, table.married)
    } else {
        (table.deduction_single, table.single)
    };
    let filers = if married { 2.0 } else { 1.0 };

    let mut taxable_income = income - deduction;
    let mut credits = 0.0;
    for (exemption, count) in [(table.personal, filers), (table.dependent, dependents as f64)] {
        match exemption {
            Exemption::Deduction(amount) => taxable_income -= amount * count,
            Exemption::Credit(amount) => credits += amount * count,
        }
    }

    if taxable_income <= 0.0 {
        return 0.0;
    }
    (bracket_tax(brackets, taxable_income) - credits).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn no_income_tax_states_owe_nothing() {
        for state in [StateCode::Tx, StateCode::Fl, StateCode::Wa, StateCode::Nv] {
            assert!(!state.has_income_tax());
            assert_approx(state_income_tax(250_000.0, true, state, 2), 0.0);
        }
    }

    #[test]
    fn flat_state_applies_personal_exemptions() {
        // Illinois: (50,000 - 2 * 2,000) * 4.95%
        assert_approx(
            state_income_tax(50_000.0, true, StateCode::Il, 0),
            46_000.0 * 0.0495,
        );
        // One dependent removes another 2,000.
        assert_approx(
            state_income_tax(50_000.0, true, StateCode::Il, 1),
            44_000.0 * 0.0495,
        );
    }

    #[test]
    fn credit_states_subtract_after_brackets() {
        // California single: 50,000 - 4,236 = 45,764 -> 80,000 bracket row at 45,753.
        let expected = 1_580.23 + (45_764.0 - 45_753.0) * 0.08 - 114.0;
        assert_approx(state_income_tax(50_000.0, false, StateCode::Ca, 0), expected);
    }

    #[test]
    fn income_below_deduction_is_untaxed() {
        assert_approx(state_income_tax(3_000.0, false, StateCode::Nc, 0), 0.0);
        assert_approx(state_income_tax(0.0, false, StateCode::Ca, 0), 0.0);
    }

    #[test]
    fn state_codes_parse_case_insensitively() {
        assert_eq!("ny".parse::<StateCode>(), Ok(StateCode::Ny));
        assert_eq!(" TX ".parse::<StateCode>(), Ok(StateCode::Tx));
        assert!("ZZ".parse::<StateCode>().is_err());
    }

    #[test]
    fn every_state_and_dc_is_supported() {
        assert_eq!(StateCode::ALL.len(), 51);
        for state in StateCode::ALL {
            assert_eq!(state.code().parse::<StateCode>(), Ok(state));
        }
        let untaxed: Vec<&str> = StateCode::ALL
            .into_iter()
            .filter(|state| !state.has_income_tax())
            .map(StateCode::code)
            .collect();
        assert_eq!(untaxed, ["AK", "FL", "NV", "SD", "TX", "WA", "WY"]);
        for code in ["nj", "MA", "or", "VA", "DC"] {
            assert!(code.parse::<StateCode>().is_ok(), "{code}");
        }
    }

    #[test]
    fn cumulative_bases_follow_floors_and_rates() {
        for state in StateCode::ALL {
            let Some(table) = table_for(state) else {
                continue;
            };
            for rows in [table.single, table.married] {
                for pair in rows.windows(2) {
                    let (floor, base, rate) = pair[0];
                    let (next_floor, next_base, _) = pair[1];
                    let expected = base + (next_floor - floor) * rate;
                    assert!(
                        (expected - next_base).abs() <= 5.0,
                        "{state} row at {next_floor}: base {next_base}, expected {expected}"
                    );
                }
            }
        }
    }

    #[test]
    fn new_jersey_single_uses_personal_exemption() {
        // (50,000 - 1,000) lands in the 40,000 row.
        assert_approx(
            state_income_tax(50_000.0, false, StateCode::Nj, 0),
            717.5 + 9_000.0 * 0.0553,
        );
    }

    #[test]
    fn new_jersey_married_rates_are_marginal() {
        // 100,000 - 2 * 1,000 = 98,000 in the 80,000 row.
        assert_approx(
            state_income_tax(100_000.0, true, StateCode::Nj, 0),
            1_645.0 + 18_000.0 * 0.05525,
        );
    }

    #[test]
    fn oregon_exemptions_are_credits() {
        // 60,000 - 4,430 = 55,570, less two 201 credits.
        let expected = 1_104.0 + (55_570.0 - 17_800.0) * 0.09 - 402.0;
        assert_approx(state_income_tax(60_000.0, true, StateCode::Or, 0), expected);
        // A dependent adds another credit.
        assert_approx(
            state_income_tax(60_000.0, true, StateCode::Or, 1),
            expected - 201.0,
        );
    }

    #[test]
    fn massachusetts_flat_rate_after_exemption() {
        assert_approx(
            state_income_tax(50_000.0, false, StateCode::Ma, 0),
            45_600.0 * 0.05,
        );
    }

    #[test]
    fn connecticut_exemption_reduces_income() {
        // 40,000 - 15,000 = 25,000 in the 10,000 row.
        assert_approx(
            state_income_tax(40_000.0, false, StateCode::Ct, 0),
            300.0 + 15_000.0 * 0.05,
        );
    }

    #[test]
    fn bracket_tax_uses_highest_row_below_income() {
        let rows = [(0.0, 0.0, 0.1), (100.0, 10.0, 0.2)];
        assert_approx(bracket_tax(&rows, 50.0), 5.0);
        assert_approx(bracket_tax(&rows, 150.0), 20.0);
        assert_approx(bracket_tax(&rows, 0.0), 0.0);
    }
}
