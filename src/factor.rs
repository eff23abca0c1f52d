// ---------------------------------------------------------------------------
// Latent Factor Scorer — non-negative factorization reconstruction
// ---------------------------------------------------------------------------
//
// The artifact holds the item-factor matrix H (components x items) and the
// settings of the solver the training run used to derive user factors. A new
// user's row x is projected with that same solver,
//
//     w = argmin_{w >= 0} 1/2 |x - wH|^2 + l1 |w|_1 + 1/2 l2 |w|^2
//
// by coordinate descent, and the predicted row is r = wH.
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::RecommendError;
use crate::scoring::{finite_candidate, Scorer};
use crate::types::{Candidate, Strategy};
use crate::vectorize::QueryVector;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings of the user-factor solver, persisted with the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformConfig {
	pub max_iter: usize,
	pub tol: f64,
	#[serde(default)]
	pub l1_reg: f64,
	#[serde(default)]
	pub l2_reg: f64,
}

impl Default for TransformConfig {
	fn default() -> Self {
		Self {
			max_iter: 200,
			tol: 1e-4,
			l1_reg: 0.0,
			l2_reg: 0.0,
		}
	}
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Upper bound on latent components; the projection allocates `k x k`.
pub const MAX_COMPONENTS: usize = 1024;

/// Immutable item-factor matrix plus its projection settings.
#[derive(Debug, Clone)]
pub struct LatentFactorModel {
	components: usize,
	item_count: usize,
	/// Row-major `components x item_count`.
	item_factors: Vec<f32>,
	transform: TransformConfig,
}

impl LatentFactorModel {
	pub fn new(
		components: usize,
		item_count: usize,
		item_factors: Vec<f32>,
		transform: TransformConfig,
	) -> Result<Self, RecommendError> {
		if components == 0 || components > MAX_COMPONENTS {
			return Err(RecommendError::Corruption(format!(
				"latent factor model has {} components, expected 1..={}",
				components, MAX_COMPONENTS
			)));
		}
		let expected = components.checked_mul(item_count).ok_or_else(|| {
			RecommendError::Corruption(format!(
				"item factor matrix shape {} x {} overflows",
				components, item_count
			))
		})?;
		if item_factors.len() != expected {
			return Err(RecommendError::Corruption(format!(
				"item factor matrix has {} values, expected {} x {}",
				item_factors.len(),
				components,
				item_count
			)));
		}
		if let Some(bad) = item_factors.iter().find(|v| !v.is_finite() || **v < 0.0) {
			return Err(RecommendError::Corruption(format!(
				"item factor matrix contains invalid value {}",
				bad
			)));
		}
		if !transform.tol.is_finite() || transform.tol < 0.0 {
			return Err(RecommendError::Corruption(format!(
				"invalid transform tolerance {}",
				transform.tol
			)));
		}
		for (name, reg) in [("l1", transform.l1_reg), ("l2", transform.l2_reg)] {
			if !reg.is_finite() || reg < 0.0 {
				return Err(RecommendError::Corruption(format!(
					"invalid {} regularization {}",
					name, reg
				)));
			}
		}
		Ok(Self {
			components,
			item_count,
			item_factors,
			transform,
		})
	}

	pub fn components(&self) -> usize {
		self.components
	}

	pub fn item_count(&self) -> usize {
		self.item_count
	}

	pub fn transform_config(&self) -> &TransformConfig {
		&self.transform
	}

	pub fn item_factors(&self) -> &[f32] {
		&self.item_factors
	}

	fn component_row(&self, c: usize) -> &[f32] {
		&self.item_factors[c * self.item_count..(c + 1) * self.item_count]
	}

	/// Project a dense rating row into factor space.
	pub fn transform(&self, x: &[f64]) -> Vec<f64> {
		let k = self.components;

		// Gram matrix HH^T and projection xH^T.
		let mut hht = vec![0.0f64; k * k];
		for a in 0..k {
			let ha = self.component_row(a);
			for b in a..k {
				let hb = self.component_row(b);
				let mut dot = 0.0;
				for j in 0..self.item_count {
					dot += ha[j] as f64 * hb[j] as f64;
				}
				hht[a * k + b] = dot;
				hht[b * k + a] = dot;
			}
		}
		let mut xht = vec![0.0f64; k];
		for (c, slot) in xht.iter_mut().enumerate() {
			let hc = self.component_row(c);
			let mut dot = 0.0;
			for (j, &xj) in x.iter().enumerate().take(self.item_count) {
				if xj != 0.0 {
					dot += xj * hc[j] as f64;
				}
			}
			*slot = dot;
		}

		if self.transform.l2_reg > 0.0 {
			for c in 0..k {
				hht[c * k + c] += self.transform.l2_reg;
			}
		}
		if self.transform.l1_reg > 0.0 {
			for v in xht.iter_mut() {
				*v -= self.transform.l1_reg;
			}
		}

		let mean = if x.is_empty() {
			0.0
		} else {
			x.iter().sum::<f64>() / x.len() as f64
		};
		let mut w = vec![(mean / k as f64).max(0.0).sqrt(); k];

		let mut violation_init = 0.0;
		for iter in 0..self.transform.max_iter {
			let mut violation = 0.0;
			for t in 0..k {
				let mut grad = -xht[t];
				for r in 0..k {
					grad += hht[t * k + r] * w[r];
				}
				let pg = if w[t] == 0.0 { grad.min(0.0) } else { grad };
				violation += pg.abs();

				let hess = hht[t * k + t];
				// NaN must survive the clamp so reconstruction can report it.
				if hess != 0.0 {
					let next = w[t] - grad / hess;
					w[t] = if next < 0.0 { 0.0 } else { next };
				}
			}

			if iter == 0 {
				violation_init = violation;
			}
			if violation_init == 0.0 || violation / violation_init <= self.transform.tol {
				break;
			}
		}
		w
	}

	/// Multiply a user-factor vector back out to a full predicted row.
	pub fn reconstruct(&self, w: &[f64]) -> Vec<f64> {
		let mut row = vec![0.0f64; self.item_count];
		for (c, &wc) in w.iter().enumerate().take(self.components) {
			if wc == 0.0 {
				continue;
			}
			for (slot, &h) in row.iter_mut().zip(self.component_row(c)) {
				*slot += wc * h as f64;
			}
		}
		row
	}
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

pub struct LatentFactorScorer<'a> {
	model: &'a LatentFactorModel,
	catalog: &'a Catalog,
}

impl<'a> LatentFactorScorer<'a> {
	pub fn new(model: &'a LatentFactorModel, catalog: &'a Catalog) -> Self {
		Self { model, catalog }
	}
}

impl Scorer for LatentFactorScorer<'_> {
	fn strategy(&self) -> Strategy {
		Strategy::LatentFactor
	}

	fn score(&self, query: &QueryVector) -> Result<Vec<Candidate>, RecommendError> {
		let w = self.model.transform(&query.values);
		let predicted = self.model.reconstruct(&w);

		self.catalog
			.item_ids()
			.iter()
			.zip(predicted)
			.map(|(id, score)| finite_candidate(Strategy::LatentFactor, *id, score))
			.collect()
	}
}
