//! RSSI to centroid-weight transfer functions.
//!
//! Every function must be non-negative and strictly increasing in RSSI over
//! the accepted domain, so a stronger signal (closer to 0 dBm) always pulls
//! the centroid harder than a weaker one.

use footfall_core::config::WeightModel;

/// Maps an RSSI reading (dBm) to a non-negative centroid weight.
pub trait WeightFunction: Send + Sync {
    fn weight(&self, rssi: f64) -> f64;
}

/// Adapter turning a closure into a [`WeightFunction`].
pub struct WeightFn<F>(pub F);

impl<F> WeightFunction for WeightFn<F>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn weight(&self, rssi: f64) -> f64 {
        (self.0)(rssi)
    }
}

impl WeightFunction for WeightModel {
    fn weight(&self, rssi: f64) -> f64 {
        match *self {
            WeightModel::Power { scale_db } => 10f64.powf(rssi / scale_db),
            WeightModel::PathLoss {
                rssi_at_1m,
                path_loss_exponent,
            } => {
                // Log-distance model: d = 10^((A - rssi) / (10 n)), weight = 1/d^2.
                let distance = 10f64.powf((rssi_at_1m - rssi) / (10.0 * path_loss_exponent));
                1.0 / (distance * distance)
            }
            WeightModel::Linear { floor_dbm } => (rssi - floor_dbm).max(0.0),
        }
    }
}
