use glam::UVec3;

use crate::types::{GridError, MapInfo};

/// Dense 3D lattice stored as a flat vector, x fastest, then y, then z.
#[derive(Debug, Clone)]
pub struct Grid3d<T> {
    info: MapInfo,
    data: Vec<T>,
}

impl<T> Grid3d<T> {
    pub fn new(info: MapInfo, data: Vec<T>) -> Result<Self, GridError> {
        let expected_len = info.cell_count();
        if data.len() != expected_len {
            return Err(GridError::InvalidMetadata(format!(
                "data length {} does not match map size {}",
                data.len(),
                expected_len
            )));
        }

        Ok(Self { info, data })
    }

    pub fn info(&self) -> &MapInfo {
        &self.info
    }

    #[inline]
    fn in_range(&self, pos: &UVec3) -> bool {
        pos.x < self.info.width && pos.y < self.info.height && pos.z < self.info.depth
    }

    #[inline]
    pub fn get(&self, pos: &UVec3) -> Option<&T> {
        self.index(pos).map(|idx| &self.data[idx])
    }

    /// Checked flat index of a cell.
    pub fn index(&self, pos: &UVec3) -> Option<usize> {
        self.in_range(pos).then(|| self.info.index(*pos))
    }

    /// One horizontal layer (`width * height` cells) at lattice height `z`.
    pub fn layer(&self, z: u32) -> Option<&[T]> {
        if z >= self.info.depth {
            return None;
        }
        let step = self.info.step_z();
        let start = z as usize * step;
        Some(&self.data[start..start + step])
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn unit_grid() -> Grid3d<i8> {
        Grid3d::<i8>::new(
            MapInfo {
                width: 4,
                height: 3,
                depth: 2,
                resolution: 1.0,
                origin: Vec3::new(-1.0, 0.0, 0.0),
            },
            vec![0; 24],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_wrong_length() {
        let info = unit_grid().info().clone();
        let err = Grid3d::<u8>::new(info, vec![0; 23]);
        assert!(matches!(err, Err(GridError::InvalidMetadata(_))));
    }

    #[test]
    fn get_and_layers() {
        let data = (0..24).collect();
        let grid = Grid3d::<i8>::new(unit_grid().info().clone(), data).unwrap();
        assert_eq!(grid.get(&UVec3::new(3, 2, 1)), Some(&23));
        assert_eq!(grid.index(&UVec3::new(1, 2, 0)), Some(9));
        assert!(grid.get(&UVec3::new(4, 0, 0)).is_none());
        assert!(grid.index(&UVec3::new(0, 0, 2)).is_none());

        let top = grid.layer(1).unwrap();
        assert_eq!(top.len(), 12);
        assert_eq!(top[0], 12);
        assert!(grid.layer(2).is_none());
        assert_eq!(grid.into_data().len(), 24);
    }
}
