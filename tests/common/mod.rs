#![allow(dead_code)]

use ksau::adapters::json_assignment_store::JsonAssignmentStore;
use ksau::domain::settings::SsotPaths;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

pub const KNOTS: &str = "\
name|crossing_number|volume|determinant|signature|alexander_polynomial
Name|Crossing Number|Hyperbolic Volume|Determinant|Signature|Alexander Polynomial
0_1|0|0|1|0|[1]
3_1|3|0|3|-2|[1,-1,1]
4_1|4|2.0298832128|5|0|[-1,3,-1]
5_1|5|0|5|-4|[1,-1,1,-1,1]
5_2|5|2.8281220883|7|-2|[2,-3,2]
6_1|6|3.1639632288|9|0|[-2,5,-2]
6_2|6|4.4008325161|11|-2|[-1,3,-3,3,-1]
6_3|6|5.6930210913|13|0|[1,-3,5,-3,1]
7_2|7|3.3317442316|11|-2|Not known
";

pub const LINKS: &str = "\
name|components|crossing_number|volume|determinant|signature
Name|Components|Crossing Number|Volume|Determinant|Signature
L2a1{0}|2|2|0|2|-1
L2a1{1}|2|2|0|2|1
L4a1{0}|2|4|0|4|-3
L5a1{0}|2|5|3.6638623767|8|-1
L6a4{0,0}|3|6|7.3277247534|16|-2
";

pub const CONSTANTS: &str = r#"{
  "kappa": 0.1308996938995747,
  "alpha_em": 0.0072973525693,
  "leptons": {
    "electron": {"mass": 0.51099895},
    "muon": {"mass": 105.6583755},
    "tau": {"mass": {"value": 1.77686, "unit": "GeV"}}
  },
  "bosons": {
    "w": {"mass": {"value": 80.377, "unit": "GeV"}}
  }
}
"#;

pub const LEGACY_ASSIGNMENTS: &str = r#"{
  "Electron": {"topology": "3_1", "crossing_number": 3, "volume": 0.0, "determinant": 3, "signature": -2, "components": 1, "mass": 0.51099895},
  "Muon": {"topology": "6_1", "crossing_number": 6, "determinant": 7, "mass": 105.6583755, "comment": "v6.1 fit"},
  "W": {"topology": "L6a4{0,0}", "mass": {"value": 80.377, "unit": "GeV"}}
}
"#;

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Tables, constants and a legacy assignment file under `data/`, with a
    /// `ksau.ini` pointing at them.
    pub fn new() -> Self {
        Self::with_settings("[data]\ndir = data\n[store]\nkeep = 3\n")
    }

    pub fn with_settings(ini: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("knotinfo_data_complete.csv"), KNOTS).unwrap();
        fs::write(data.join("linkinfo_data_complete.csv"), LINKS).unwrap();
        fs::write(data.join("physical_constants.json"), CONSTANTS).unwrap();
        fs::write(data.join("topology_assignments.json"), LEGACY_ASSIGNMENTS).unwrap();
        fs::write(dir.path().join("ksau.ini"), ini).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("ksau.ini")
    }

    pub fn data_path(&self, name: &str) -> PathBuf {
        self.root().join("data").join(name)
    }

    pub fn paths(&self) -> SsotPaths {
        let (settings, base) = ksau::cli::load_settings(Some(self.config_path().as_path())).unwrap();
        SsotPaths::from_config(&settings, &base).unwrap()
    }

    pub fn store(&self) -> JsonAssignmentStore {
        ksau::cli::assignment_store(&self.paths())
    }

    pub fn write_data(&self, name: &str, content: &str) {
        fs::write(self.data_path(name), content).unwrap();
    }
}

/// `ExitCode` has no `PartialEq`; compare through its debug form.
pub fn assert_exit(code: ExitCode, expected: u8) {
    assert_eq!(
        format!("{code:?}"),
        format!("{:?}", ExitCode::from(expected)),
        "unexpected exit code"
    );
}
