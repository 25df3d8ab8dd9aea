use ndarray::{Array3, ArrayView2, Axis};
use std::io::{self, Write};

/// One acquisition cycle of real baseband samples indexed `[antenna, chirp, sample]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub sequence: u64,
    pub timestamp_s: f64,
    data: Array3<f32>,
}

impl RawFrame {
    pub fn new(sequence: u64, timestamp_s: f64, data: Array3<f32>) -> Self {
        Self {
            sequence,
            timestamp_s,
            data,
        }
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn num_antennas(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn num_chirps(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn num_samples(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Chirp-by-sample matrix of a single antenna.
    pub fn antenna(&self, index: usize) -> Option<ArrayView2<'_, f32>> {
        (index < self.num_antennas()).then(|| self.data.index_axis(Axis(0), index))
    }

    /// Writes one antenna matrix as bracketed, space-separated rows followed by
    /// a blank line. Used as a diagnostic sink only.
    pub fn dump_matrix<W: Write>(&self, antenna: usize, writer: &mut W) -> io::Result<()> {
        let matrix = self.antenna(antenna).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("antenna {} not present in frame", antenna),
            )
        })?;
        writeln!(writer, "[")?;
        for row in matrix.rows() {
            let line = row
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(writer, "{}", line)?;
        }
        writeln!(writer, "]")?;
        writeln!(writer)?;
        Ok(())
    }
}
