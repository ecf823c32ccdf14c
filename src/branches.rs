use super::error::{NetMetError, Result};

/// Suffixes read for the L1 energy sums (before the source prefix is added).
pub const SUM_BRANCHES: [&str; 3] = ["EtSum_pt", "EtSum_etSumType", "EtSum_bx"];

/// Per-object suffixes, joined as `<Object>_<suffix>`.
pub const OBJECT_BRANCHES: [&str; 4] = ["pt", "eta", "phi", "bx"];

pub const PUPPI_MET_BRANCHES: [&str; 2] = ["PuppiMET_pt", "PuppiMET_phi"];
pub const MUON_BRANCHES: [&str; 3] = ["Muon_pt", "Muon_phi", "Muon_isPFcand"];
pub const RECO_BRANCHES: [&str; 1] = ["PV_npvsGood"];

/// Object types that carry several candidates per event and get sorted/padded on export.
pub const MULTI_OBJECT_TYPES: [&str; 3] = ["Jet", "EG", "Tau"];

// Stage markers stripped from raw branch names by the loader.
const L1_MARKER: &str = "L1";
const MP_MARKER: &str = "MP";
const EMUL_MARKER: &str = "Emul";

// github.com/cms-sw/cmssw/blob/master/DataFormats/L1Trigger/interface/EtSum.h
const SUM_TYPES: [(&str, i32); 22] = [
    ("ett", 0),
    ("htt", 1),
    ("met", 2),
    ("mht", 3),
    ("metx", 4),
    ("mety", 5),
    ("htx", 6),
    ("hty", 7),
    ("methf", 8),
    ("etxhf", 9),
    ("etyhf", 10),
    ("mbhfp0", 11),
    ("mbhfm0", 12),
    ("mbhfp1", 13),
    ("mbhfm1", 14),
    ("etthf", 15),
    ("ettem", 16),
    ("htthf", 17),
    ("htxhf", 18),
    ("htyhf", 19),
    ("mhthf", 20),
    ("ntt", 21),
];

/// Discriminator code for a named energy sum. Unknown names are a hard error.
pub fn sum_code(name: &str) -> Result<i32> {
    SUM_TYPES
        .iter()
        .find(|(sum, _)| *sum == name)
        .map(|(_, code)| *code)
        .ok_or_else(|| NetMetError::Lookup(format!("no energy sum named '{name}'")))
}

pub fn is_multi_object(name: &str) -> bool {
    MULTI_OBJECT_TYPES.contains(&name)
}

/// Canonical column names for one object type, in `OBJECT_BRANCHES` order.
pub fn object_columns(object: &str) -> Vec<String> {
    OBJECT_BRANCHES
        .iter()
        .map(|var| format!("{object}_{var}"))
        .collect()
}

/// Returns the object prefix and the sum prefix for the requested source stage.
pub fn source_types(use_emu: bool, use_mp: bool) -> (String, String) {
    let l1_type = if use_emu {
        format!("{L1_MARKER}{EMUL_MARKER}")
    } else {
        L1_MARKER.to_owned()
    };
    let l1_sum_type = if use_mp {
        format!("{l1_type}{MP_MARKER}")
    } else {
        l1_type.clone()
    };

    (l1_type, l1_sum_type)
}

/// Every raw branch the pipeline reads for the given object types.
pub fn source_branches(objects: &[String], use_emu: bool, use_mp: bool) -> Vec<String> {
    let (l1_type, l1_sum_type) = source_types(use_emu, use_mp);

    let mut branches: Vec<String> = SUM_BRANCHES
        .iter()
        .map(|var| format!("{l1_sum_type}{var}"))
        .collect();
    branches.extend(PUPPI_MET_BRANCHES.iter().map(|b| (*b).to_owned()));
    branches.extend(MUON_BRANCHES.iter().map(|b| (*b).to_owned()));
    branches.extend(RECO_BRANCHES.iter().map(|b| (*b).to_owned()));

    for object in objects {
        branches.extend(
            OBJECT_BRANCHES
                .iter()
                .map(|var| format!("{l1_type}{object}_{var}")),
        );
    }

    branches
}

/// Removes the source-stage markers from a branch name that carries the `L1` marker.
/// Markers are removed until none is left, so a marker exposed by an earlier
/// removal goes too and the result never carries one.
pub fn strip_source_prefix(branch: &str) -> String {
    if !branch.contains(L1_MARKER) {
        return branch.to_owned();
    }

    let mut name = branch.to_owned();
    loop {
        let stripped = name
            .replace(L1_MARKER, "")
            .replace(MP_MARKER, "")
            .replace(EMUL_MARKER, "");
        if stripped == name {
            return name;
        }
        name = stripped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_codes_follow_the_etsum_enumeration() {
        assert_eq!(sum_code("ett").unwrap(), 0);
        assert_eq!(sum_code("met").unwrap(), 2);
        assert_eq!(sum_code("mht").unwrap(), 3);
        assert_eq!(sum_code("methf").unwrap(), 8);
        assert_eq!(sum_code("ntt").unwrap(), 21);
        assert_eq!(SUM_TYPES.len(), 22);
    }

    #[test]
    fn unknown_sum_is_a_lookup_error() {
        assert!(matches!(sum_code("bogus"), Err(NetMetError::Lookup(_))));
    }

    #[test]
    fn stripping_is_idempotent_and_order_independent() {
        let names = [
            "L1EmulMPEtSum_pt",
            "L1MPEtSum_bx",
            "L1EmulJet_eta",
            "L1Jet_pt",
            "PuppiMET_pt",
            "Muon_isPFcand",
        ];
        for name in names {
            let once = strip_source_prefix(name);
            assert_eq!(strip_source_prefix(&once), once);

            let other_order = if name.contains(L1_MARKER) {
                name.replace(EMUL_MARKER, "")
                    .replace(MP_MARKER, "")
                    .replace(L1_MARKER, "")
            } else {
                name.to_owned()
            };
            assert_eq!(once, other_order);
        }
        assert_eq!(strip_source_prefix("L1EmulMPEtSum_pt"), "EtSum_pt");
        assert_eq!(strip_source_prefix("L1EmulJet_eta"), "Jet_eta");
    }

    #[test]
    fn markers_exposed_by_stripping_are_removed() {
        let once = strip_source_prefix("LL11Jet_pt");
        assert_eq!(once, "Jet_pt");
        assert_eq!(strip_source_prefix(&once), once);
        assert_eq!(strip_source_prefix("L1EmEmululJet_pt"), "Jet_pt");
    }

    #[test]
    fn source_branches_use_stage_prefixes() {
        let branches = source_branches(&["Jet".to_owned()], true, true);
        assert!(branches.contains(&"L1EmulMPEtSum_pt".to_owned()));
        assert!(branches.contains(&"L1EmulJet_bx".to_owned()));
        assert!(branches.contains(&"PuppiMET_phi".to_owned()));
        assert!(branches.contains(&"PV_npvsGood".to_owned()));
        assert_eq!(branches.len(), 3 + 2 + 3 + 1 + 4);

        let (l1_type, l1_sum_type) = source_types(false, false);
        assert_eq!(l1_type, "L1");
        assert_eq!(l1_sum_type, "L1");
    }
}
