//! Per-step snapshot hand-off and diagnostic time series.

use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::prelude::*;
use crate::solver::energy::EnergyRow;

//------------------------------------------------------------------------------
// Snapshots
//------------------------------------------------------------------------------

/// Read-only view of the solution after a completed step. Borrowed from the
/// integrator state; consumers must not hold it across steps.
pub struct Snapshot<'a> {
    pub t: f64,
    pub u: &'a VectorD, // displacement
    pub v: &'a VectorD, // velocity
    pub a: &'a VectorD, // acceleration
}

/// Consumer of per-step solution snapshots, called once per completed step
/// after the corrector.
pub trait SnapshotWriter {
    fn accept(&mut self, snapshot: &Snapshot);
}

/// Discards every snapshot
#[derive(Debug, Default)]
pub struct NullWriter;

impl SnapshotWriter for NullWriter {
    fn accept(&mut self, _snapshot: &Snapshot) {}
}

/// Keeps a copy of every snapshot in memory
#[derive(Debug, Default)]
pub struct MemoryWriter {
    pub t: Vec<f64>,
    pub u: Vec<VectorD>,
    pub v: Vec<VectorD>,
    pub a: Vec<VectorD>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

impl SnapshotWriter for MemoryWriter {
    fn accept(&mut self, snapshot: &Snapshot) {
        self.t.push(snapshot.t);
        self.u.push(snapshot.u.clone());
        self.v.push(snapshot.v.clone());
        self.a.push(snapshot.a.clone());
    }
}

/// Writes one ascii VTK polyline file per step. Each scalar dof is a point
/// displacing along `axis` from its reference position, which covers the
/// bar/cantilever models this core is exercised with; richer field
/// projections belong to the external assembly side.
pub struct VtkSeriesWriter {
    dir: PathBuf,
    x0: Matrix3xX, // reference node positions
    axis: Vector3,
    step: usize,
}

impl VtkSeriesWriter {
    pub fn new(dir: impl Into<PathBuf>, x0: Matrix3xX, axis: Vector3) -> Self {
        VtkSeriesWriter {
            dir: dir.into(),
            x0,
            axis,
            step: 0,
        }
    }

    fn vectors(&self, field: &VectorD) -> Vec<f64> {
        field
            .iter()
            .flat_map(|&s| {
                let w = self.axis * s;
                [w[0], w[1], w[2]]
            })
            .collect_vec()
    }
}

impl SnapshotWriter for VtkSeriesWriter {
    fn accept(&mut self, snapshot: &Snapshot) {
        use vtkio::model::*;

        let n = self.x0.ncols();
        debug_assert_eq!(snapshot.u.len(), n);

        let points = (0..n)
            .flat_map(|i| {
                let p = Vector3::from(self.x0.column(i)) + self.axis * snapshot.u[i];
                [p[0], p[1], p[2]]
            })
            .collect_vec();

        let fields = [
            ("Displacement", snapshot.u),
            ("Velocity", snapshot.v),
            ("Acceleration", snapshot.a),
        ];

        let vtk = Vtk {
            version: Version { major: 4, minor: 2 },
            title: String::new(),
            byte_order: ByteOrder::LittleEndian,
            file_path: None,
            data: DataSet::inline(UnstructuredGridPiece {
                points: IOBuffer::F64(points),
                cells: Cells {
                    cell_verts: VertexNumbers::XML {
                        connectivity: (0..n as u64).collect_vec(),
                        offsets: vec![n as u64],
                    },
                    types: vec![CellType::PolyLine],
                },
                data: Attributes {
                    point: fields
                        .iter()
                        .map(|&(name, field)| {
                            Attribute::DataArray(DataArrayBase {
                                name: name.to_string(),
                                elem: ElementType::Vectors,
                                data: IOBuffer::F64(self.vectors(field)),
                            })
                        })
                        .collect_vec(),
                    ..Default::default()
                },
            }),
        };

        let path = self.dir.join(format!("step_{:0>4}.vtk", self.step));
        if let Err(e) = vtk.export_ascii(&path) {
            log::warn!("failed to write {}: {}", path.display(), e);
        }
        self.step += 1;
    }
}

//------------------------------------------------------------------------------
// Time series
//------------------------------------------------------------------------------

/// Append-only per-step logs: time, displacement of the monitored tip dof,
/// and the energy table row. One row per completed step; read by the caller
/// for plotting and reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimeSeries {
    pub t: Vec<f64>,
    pub tip: Vec<f64>,
    pub energy: Vec<EnergyRow>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, t: f64, tip: f64, energy: EnergyRow) {
        self.t.push(t);
        self.tip.push(tip);
        self.energy.push(energy);
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// One csv row per step: t, tip, elastic, kinetic, damping, total
    pub fn write_csv<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        for (t, tip, e) in izip!(&self.t, &self.tip, &self.energy) {
            writeln!(
                w,
                "{:?},{:?},{:?},{:?},{:?},{:?}",
                t, tip, e.elastic, e.kinetic, e.damping, e.total
            )?;
        }
        Ok(())
    }

    pub fn write_json<W: Write>(&self, w: &mut W) -> serde_json::Result<()> {
        serde_json::to_writer(w, self)
    }
}
