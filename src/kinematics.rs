use super::error::Result;
use super::exporter::{ColumnName, FlatTable};
use nalgebra::Vector4;

pub const M_JJJJ_SQ: &str = "m_jjjj_sq";
pub const M_JJJ: &str = "m_jjj";

/// Collider coordinates of one reconstructed object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PtEtaPhi {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
}

impl PtEtaPhi {
    pub fn new(pt: f64, eta: f64, phi: f64) -> Self {
        Self { pt, eta, phi }
    }

    /// (px, py, pz, E) assuming zero rest mass.
    pub fn massless_four_momentum(&self) -> Vector4<f64> {
        let px = self.pt * self.phi.cos();
        let py = self.pt * self.phi.sin();
        let pz = self.pt * self.eta.sinh();
        let e = (px * px + py * py + pz * pz).sqrt();
        Vector4::new(px, py, pz, e)
    }
}

/// Minkowski mass squared of a summed (px, py, pz, E) vector, clamped at zero so
/// rounding on nearly massless systems never goes negative.
pub fn invariant_mass_sq(p: &Vector4<f64>) -> f64 {
    let (px, py, pz, e) = (p[0], p[1], p[2], p[3]);
    (e * e - px * px - py * py - pz * pz).max(0.0)
}

pub fn four_jet_mass_sq(jets: &[PtEtaPhi; 4]) -> f64 {
    let total: Vector4<f64> = jets.iter().map(PtEtaPhi::massless_four_momentum).sum();
    invariant_mass_sq(&total)
}

/// Massless two-body mass squared: 2 pt_a pt_b (cosh(deta) - cos(dphi)).
pub fn pair_mass_sq(a: &PtEtaPhi, b: &PtEtaPhi) -> f64 {
    2.0 * a.pt * b.pt * ((a.eta - b.eta).cosh() - (a.phi - b.phi).cos())
}

/// Sum of the three pairwise masses squared, then the square root.
///
/// This is not the mass of the summed four-momentum (see [`four_jet_mass_sq`]);
/// the pairwise sum is kept as the analysis defines it.
pub fn three_jet_mass(jets: &[PtEtaPhi; 3]) -> f64 {
    let total = pair_mass_sq(&jets[0], &jets[1])
        + pair_mass_sq(&jets[0], &jets[2])
        + pair_mass_sq(&jets[1], &jets[2]);
    total.max(0.0).sqrt()
}

fn leading_jets<const N: usize>(table: &FlatTable) -> Result<Vec<[PtEtaPhi; N]>> {
    let mut columns = Vec::with_capacity(N);
    for i in 0..N {
        columns.push((
            table.get(&format!("Jet_{i}_pt"))?,
            table.get(&format!("Jet_{i}_eta"))?,
            table.get(&format!("Jet_{i}_phi"))?,
        ));
    }

    Ok((0..table.rows())
        .map(|row| {
            std::array::from_fn(|i| {
                let (pt, eta, phi) = columns[i];
                PtEtaPhi::new(pt[row], eta[row], phi[row])
            })
        })
        .collect())
}

/// Appends `m_jjjj_sq` from the four leading jet columns of an exported table.
pub fn add_four_jet_mass(table: &mut FlatTable) -> Result<()> {
    let values: Vec<f64> = leading_jets::<4>(table)?
        .iter()
        .map(four_jet_mass_sq)
        .collect();
    table.push(ColumnName::Joined(M_JJJJ_SQ.to_owned()), values)
}

/// Appends `m_jjj` from the three leading jet columns of an exported table.
pub fn add_three_jet_mass(table: &mut FlatTable) -> Result<()> {
    let values: Vec<f64> = leading_jets::<3>(table)?
        .iter()
        .map(three_jet_mass)
        .collect();
    table.push(ColumnName::Joined(M_JJJ.to_owned()), values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collinear_massless_jets_have_zero_mass() {
        let jets = [
            PtEtaPhi::new(40.0, 0.0, 0.0),
            PtEtaPhi::new(30.0, 0.0, 0.0),
            PtEtaPhi::new(20.0, 0.0, 0.0),
            PtEtaPhi::new(10.0, 0.0, 0.0),
        ];
        assert_eq!(four_jet_mass_sq(&jets), 0.0);
    }

    #[test]
    fn back_to_back_pair_mass() {
        // two 50 GeV jets back to back at eta 0: m = 100
        let a = PtEtaPhi::new(50.0, 0.0, 0.0);
        let b = PtEtaPhi::new(50.0, 0.0, std::f64::consts::PI);
        assert!((pair_mass_sq(&a, &b) - 10_000.0).abs() < 1e-6);

        let empty = PtEtaPhi::new(0.0, 0.0, 0.0);
        let jets = [a, b, empty, empty];
        assert!((four_jet_mass_sq(&jets) - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn three_jet_mass_sums_pairs() {
        let a = PtEtaPhi::new(50.0, 0.0, 0.0);
        let b = PtEtaPhi::new(50.0, 0.0, std::f64::consts::PI);
        let c = PtEtaPhi::new(0.0, 0.0, 0.0);
        assert!((three_jet_mass(&[a, b, c]) - 100.0).abs() < 1e-6);

        let collinear = PtEtaPhi::new(10.0, 0.5, 0.5);
        assert_eq!(three_jet_mass(&[collinear; 3]), 0.0);
    }

    #[test]
    fn mass_columns_are_appended() {
        let mut table = FlatTable::default();
        for i in 0..4 {
            let phi = if i == 1 { std::f64::consts::PI } else { 0.0 };
            let pt = if i < 2 { 50.0 } else { 0.0 };
            table
                .push(ColumnName::Joined(format!("Jet_{i}_eta")), vec![0.0])
                .unwrap();
            table
                .push(ColumnName::Joined(format!("Jet_{i}_phi")), vec![phi])
                .unwrap();
            table
                .push(ColumnName::Joined(format!("Jet_{i}_pt")), vec![pt])
                .unwrap();
        }
        add_four_jet_mass(&mut table).unwrap();
        add_three_jet_mass(&mut table).unwrap();

        assert!((table.get(M_JJJJ_SQ).unwrap()[0] - 10_000.0).abs() < 1e-6);
        assert!((table.get(M_JJJ).unwrap()[0] - 100.0).abs() < 1e-6);
    }
}
