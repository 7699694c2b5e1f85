use ndarray::Array2;
use num_complex::{Complex, Complex32};
use serde::{Deserialize, Serialize};

use crate::configuration::ServiceKind;
use crate::math::stats::StatsHelper;

/// Per-result status flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultInfo {
    /// Starts at 1 after activation and grows by one per produced result.
    /// Cycles fail with `InvalidState` once `u32::MAX` has been handed out.
    pub sequence_number: u32,
    pub data_saturated: bool,
    /// A transfer had to be retried while producing this result.
    pub sensor_communication_error: bool,
}

/// Processed data of one result.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Envelope(Vec<u16>),
    Iq(Vec<Complex32>),
    IqInt16(Vec<Complex<i16>>),
    PowerBins(Vec<f32>),
    /// Sweeps by points.
    Sparse(Array2<u16>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Envelope(data) => data.len(),
            Payload::Iq(data) => data.len(),
            Payload::IqInt16(data) => data.len(),
            Payload::PowerBins(data) => data.len(),
            Payload::Sparse(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ServiceKind {
        match self {
            Payload::Envelope(_) => ServiceKind::Envelope,
            Payload::Iq(_) | Payload::IqInt16(_) => ServiceKind::Iq,
            Payload::PowerBins(_) => ServiceKind::PowerBins,
            Payload::Sparse(_) => ServiceKind::Sparse,
        }
    }

    /// Real-valued view of the payload, flattened sweep-major for sparse data.
    pub fn magnitudes(&self) -> Vec<f32> {
        match self {
            Payload::Envelope(data) => data.iter().map(|&v| v as f32).collect(),
            Payload::Iq(data) => data.iter().map(|v| v.norm()).collect(),
            Payload::IqInt16(data) => data
                .iter()
                .map(|v| Complex32::new(v.re as f32, v.im as f32).norm())
                .collect(),
            Payload::PowerBins(data) => data.clone(),
            Payload::Sparse(data) => data.iter().map(|&v| v as f32).collect(),
        }
    }
}

/// One delivered result.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub info: ResultInfo,
    pub payload: Payload,
}

impl Measurement {
    pub fn sequence_number(&self) -> u32 {
        self.info.sequence_number
    }

    pub fn summary(&self) -> MeasurementSummary {
        MeasurementSummary::from(self)
    }
}

/// Compact, serializable digest of a [`Measurement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSummary {
    pub sequence_number: u32,
    pub data_saturated: bool,
    pub sensor_communication_error: bool,
    pub kind: ServiceKind,
    pub data_length: usize,
    pub peak_index: Option<usize>,
    pub peak_value: Option<f32>,
    pub rms: f32,
}

impl From<&Measurement> for MeasurementSummary {
    fn from(measurement: &Measurement) -> Self {
        let magnitudes = measurement.payload.magnitudes();
        let peak = StatsHelper::peak(&magnitudes);
        Self {
            sequence_number: measurement.info.sequence_number,
            data_saturated: measurement.info.data_saturated,
            sensor_communication_error: measurement.info.sensor_communication_error,
            kind: measurement.payload.kind(),
            data_length: measurement.payload.len(),
            peak_index: peak.map(|(index, _)| index),
            peak_value: peak.map(|(_, value)| value),
            rms: StatsHelper::rms(&magnitudes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_length_counts_every_sample() {
        let payload = Payload::Sparse(Array2::zeros((4, 6)));
        assert_eq!(payload.len(), 24);
        assert_eq!(payload.kind(), ServiceKind::Sparse);
    }

    #[test]
    fn summary_reports_the_strongest_point() {
        let measurement = Measurement {
            info: ResultInfo {
                sequence_number: 3,
                data_saturated: true,
                sensor_communication_error: false,
            },
            payload: Payload::Envelope(vec![10, 400, 20]),
        };
        let summary = measurement.summary();
        assert_eq!(summary.sequence_number, 3);
        assert!(summary.data_saturated);
        assert_eq!(summary.peak_index, Some(1));
        assert_eq!(summary.peak_value, Some(400.0));
        assert_eq!(summary.data_length, 3);
    }
}
