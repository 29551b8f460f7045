// src/referral.rs

use rand::Rng;

/// A referral landing page and its selection weight.
#[derive(Debug, Clone, Copy)]
pub struct PromoDomain {
    pub url: &'static str,
    pub weight: u32,
}

/// Candidate pages opened alongside every metadata request. The `.vn`
/// domain is favoured 4:1 over each of the others.
pub const PROMO_DOMAINS: [PromoDomain; 4] = [
    PromoDomain { url: "https://timchuyenbay.com", weight: 1 },
    PromoDomain { url: "https://timchuyenbay.vn", weight: 4 },
    PromoDomain { url: "https://datvedoan.com", weight: 1 },
    PromoDomain { url: "https://datvedoan.net", weight: 1 },
];

/// Picks a promo page by weighted random selection.
pub fn pick_domain<R: Rng>(rng: &mut R) -> &'static str {
    let total: u32 = PROMO_DOMAINS.iter().map(|d| d.weight).sum();
    let mut roll = rng.gen_range(0..total);
    for domain in &PROMO_DOMAINS {
        if roll < domain.weight {
            return domain.url;
        }
        roll -= domain.weight;
    }
    // Weights are positive constants, so the loop always returns.
    PROMO_DOMAINS[0].url
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn selection_matches_configured_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        let trials = 70_000;
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for _ in 0..trials {
            *counts.entry(pick_domain(&mut rng)).or_default() += 1;
        }

        let total_weight: u32 = PROMO_DOMAINS.iter().map(|d| d.weight).sum();
        for domain in &PROMO_DOMAINS {
            let expected = trials as f64 * domain.weight as f64 / total_weight as f64;
            let observed = *counts.get(domain.url).unwrap_or(&0) as f64;
            let deviation = (observed - expected).abs() / trials as f64;
            assert!(
                deviation < 0.01,
                "{} drew {} of {} (expected ~{})",
                domain.url,
                observed,
                trials,
                expected
            );
        }
    }

    #[test]
    fn every_candidate_is_reachable() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen: HashMap<&str, bool> = HashMap::new();
        for _ in 0..1_000 {
            seen.insert(pick_domain(&mut rng), true);
        }
        assert_eq!(seen.len(), PROMO_DOMAINS.len());
    }
}
