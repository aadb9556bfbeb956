//! An in-memory geometry kernel.
//!
//! Cells hold shapes on layers and arrays of instances of other cells.
//! Both live in slot maps with versioned keys, so a handle to a destroyed
//! instance stays detectably stale and never aliases a newer instance.

use std::collections::HashSet;

use placegeom::bbox::{Bbox, BoundBox};
use placegeom::transform::{Transform, Transformation};
use placegeom::{Point, Shape};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use super::layers::LayerSpec;
use crate::deps::arcstr::ArcStr;

new_key_type! {
    /// A unique identifier for kernel cells.
    pub struct CellKey;
}

new_key_type! {
    /// A unique identifier for placed instance arrays.
    pub struct InstKey;
}

/// An enumeration of kernel errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum KernelError {
    /// The instance handle was destroyed.
    #[error("instance handle is no longer valid")]
    StaleInstance,

    /// The cell was deleted or never existed.
    #[error("cell not found")]
    CellNotFound,
}

/// A primitive geometric element: a [`Shape`] on a [`LayerSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// The layer where the element is located.
    pub layer: LayerSpec,
    /// The element's shape.
    pub inner: Shape,
}

impl Element {
    /// Creates a new [`Element`].
    pub fn new(layer: impl Into<LayerSpec>, shape: impl Into<Shape>) -> Self {
        Self {
            layer: layer.into(),
            inner: shape.into(),
        }
    }
}

impl Transform for Element {
    fn transform(&self, trans: Transformation) -> Self {
        Self {
            layer: self.layer,
            inner: self.inner.transform(trans),
        }
    }
}

#[derive(Debug, Default)]
struct KernelCell {
    name: ArcStr,
    elems: Vec<Element>,
    insts: Vec<InstKey>,
}

/// A `na` by `nb` array of placements of a template cell inside a parent cell.
///
/// Copy `(i, j)` is displaced by `i * a + j * b` in the parent frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstArray {
    pub parent: CellKey,
    pub template: CellKey,
    pub trans: Transformation,
    pub a: Point,
    pub b: Point,
    pub na: usize,
    pub nb: usize,
}

impl InstArray {
    /// The transformation of every copy, starting with the origin copy.
    pub fn copies(self) -> impl Iterator<Item = Transformation> {
        (0..self.nb).flat_map(move |j| {
            (0..self.na).map(move |i| {
                let d = self.a * i as f64 + self.b * j as f64;
                Transformation::cascade(Transformation::translate(d.x, d.y), self.trans)
            })
        })
    }
}

/// Applies only the linear part of `trans` to the vector `p`.
fn apply_linear(trans: Transformation, p: Point) -> Point {
    Point::new(
        trans.a[0][0] * p.x + trans.a[0][1] * p.y,
        trans.a[1][0] * p.x + trans.a[1][1] * p.y,
    )
}

/// Storage for cells and instance arrays.
#[derive(Debug, Default)]
pub struct GeomKernel {
    cells: SlotMap<CellKey, KernelCell>,
    insts: SlotMap<InstKey, InstArray>,
}

impl GeomKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cell.
    pub fn create_cell(&mut self, name: impl Into<ArcStr>) -> CellKey {
        self.cells.insert(KernelCell {
            name: name.into(),
            ..Default::default()
        })
    }

    #[inline]
    pub fn has_cell(&self, cell: CellKey) -> bool {
        self.cells.contains_key(cell)
    }

    pub fn cell_name(&self, cell: CellKey) -> Result<&ArcStr, KernelError> {
        Ok(&self.cell(cell)?.name)
    }

    /// Deletes a cell, destroying every instance placed in it
    /// and every instance that uses it as a template.
    pub fn delete_cell(&mut self, cell: CellKey) -> Result<(), KernelError> {
        let removed = self.cells.remove(cell).ok_or(KernelError::CellNotFound)?;
        for key in removed.insts {
            self.insts.remove(key);
        }
        let users: Vec<InstKey> = self
            .insts
            .iter()
            .filter(|(_, inst)| inst.template == cell)
            .map(|(key, _)| key)
            .collect();
        for key in users {
            self.destroy(key);
        }
        Ok(())
    }

    pub fn add_element(&mut self, cell: CellKey, elem: Element) -> Result<(), KernelError> {
        self.cell_mut(cell)?.elems.push(elem);
        Ok(())
    }

    pub fn elements(&self, cell: CellKey) -> Result<&[Element], KernelError> {
        Ok(&self.cell(cell)?.elems)
    }

    pub fn instances(&self, cell: CellKey) -> Result<&[InstKey], KernelError> {
        Ok(&self.cell(cell)?.insts)
    }

    /// Places an `na` by `nb` array of `template` inside `parent`.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_instance(
        &mut self,
        parent: CellKey,
        template: CellKey,
        trans: Transformation,
        a: Point,
        b: Point,
        na: usize,
        nb: usize,
    ) -> Result<InstKey, KernelError> {
        if !self.cells.contains_key(template) {
            return Err(KernelError::CellNotFound);
        }
        self.cell(parent)?;
        let key = self.insts.insert(InstArray {
            parent,
            template,
            trans,
            a,
            b,
            na,
            nb,
        });
        self.cell_mut(parent)?.insts.push(key);
        Ok(key)
    }

    #[inline]
    pub fn is_valid(&self, key: InstKey) -> bool {
        self.insts.contains_key(key)
    }

    /// Destroys an instance. Returns `false` if it was already gone.
    pub fn destroy(&mut self, key: InstKey) -> bool {
        match self.insts.remove(key) {
            Some(inst) => {
                if let Some(parent) = self.cells.get_mut(inst.parent) {
                    parent.insts.retain(|k| *k != key);
                }
                true
            }
            None => false,
        }
    }

    pub fn instance(&self, key: InstKey) -> Result<InstArray, KernelError> {
        self.inst(key).copied()
    }

    pub fn transformation(&self, key: InstKey) -> Result<Transformation, KernelError> {
        Ok(self.inst(key)?.trans)
    }

    pub fn set_transformation(
        &mut self,
        key: InstKey,
        trans: Transformation,
    ) -> Result<(), KernelError> {
        self.inst_mut(key)?.trans = trans;
        Ok(())
    }

    /// Applies `trans` on top of the instance's current transformation.
    ///
    /// The array displacement vectors are transformed along with it.
    pub fn transform(&mut self, key: InstKey, trans: Transformation) -> Result<(), KernelError> {
        let inst = self.inst_mut(key)?;
        inst.trans = Transformation::cascade(trans, inst.trans);
        inst.a = apply_linear(trans, inst.a);
        inst.b = apply_linear(trans, inst.b);
        Ok(())
    }

    /// The bounding box of a cell's contents in its own frame.
    pub fn cell_bbox(&self, cell: CellKey) -> Result<Bbox, KernelError> {
        let c = self.cell(cell)?;
        let mut bbox = Bbox::empty();
        for elem in c.elems.iter() {
            bbox = bbox.union(elem.inner.bbox());
        }
        for key in c.insts.iter() {
            bbox = bbox.union(self.bbox(*key)?);
        }
        Ok(bbox)
    }

    /// The bounding box of an instance array in its parent's frame.
    pub fn bbox(&self, key: InstKey) -> Result<Bbox, KernelError> {
        let inst = *self.inst(key)?;
        let inner = self.cell_bbox(inst.template)?;
        if inner.is_empty() {
            return Ok(inner);
        }
        let rect = inner.into_rect();
        Ok(inst
            .copies()
            .fold(Bbox::empty(), |acc, t| acc.union(rect.transform(t).bbox())))
    }

    /// Flattened geometry of `cell`, transformed by `trans`.
    pub fn polygons(
        &self,
        cell: CellKey,
        trans: Transformation,
    ) -> Result<Vec<Element>, KernelError> {
        let c = self.cell(cell)?;
        let mut out: Vec<Element> = c.elems.iter().map(|e| e.transform(trans)).collect();
        for key in c.insts.iter() {
            out.extend(self.instance_polygons(*key, trans)?);
        }
        Ok(out)
    }

    /// Flattened geometry of every copy of an instance array in its parent's frame,
    /// transformed by `trans`.
    pub fn instance_polygons(
        &self,
        key: InstKey,
        trans: Transformation,
    ) -> Result<Vec<Element>, KernelError> {
        let inst = *self.inst(key)?;
        let mut out = Vec::new();
        for copy in inst.copies() {
            out.extend(self.polygons(inst.template, Transformation::cascade(trans, copy))?);
        }
        Ok(out)
    }

    /// Replaces every instance in `cell` with its geometry.
    ///
    /// Returns the number of instance handles destroyed.
    pub fn flatten(&mut self, cell: CellKey) -> Result<usize, KernelError> {
        let keys = self.cell(cell)?.insts.clone();
        let mut elems = Vec::new();
        for key in keys.iter() {
            elems.extend(self.instance_polygons(*key, Transformation::identity())?);
        }
        for key in keys.iter() {
            self.destroy(*key);
        }
        self.cell_mut(cell)?.elems.extend(elems);
        Ok(keys.len())
    }

    /// Returns `true` if `needle` is `root` or is placed anywhere below it.
    pub fn contains_cell(&self, root: CellKey, needle: CellKey) -> bool {
        let mut stack = vec![root];
        let mut visited = HashSet::new();
        while let Some(cell) = stack.pop() {
            if cell == needle {
                return true;
            }
            if !visited.insert(cell) {
                continue;
            }
            if let Some(c) = self.cells.get(cell) {
                stack.extend(
                    c.insts
                        .iter()
                        .filter_map(|key| self.insts.get(*key))
                        .map(|inst| inst.template),
                );
            }
        }
        false
    }

    fn cell(&self, cell: CellKey) -> Result<&KernelCell, KernelError> {
        self.cells.get(cell).ok_or(KernelError::CellNotFound)
    }

    fn cell_mut(&mut self, cell: CellKey) -> Result<&mut KernelCell, KernelError> {
        self.cells.get_mut(cell).ok_or(KernelError::CellNotFound)
    }

    fn inst(&self, key: InstKey) -> Result<&InstArray, KernelError> {
        self.insts.get(key).ok_or(KernelError::StaleInstance)
    }

    fn inst_mut(&mut self, key: InstKey) -> Result<&mut InstArray, KernelError> {
        self.insts.get_mut(key).ok_or(KernelError::StaleInstance)
    }
}

#[cfg(test)]
mod tests {
    use placegeom::Rect;

    use super::*;

    fn unit_square(kernel: &mut GeomKernel) -> CellKey {
        let cell = kernel.create_cell("square");
        kernel
            .add_element(
                cell,
                Element::new((1, 0), Rect::new(Point::zero(), Point::new(1., 1.))),
            )
            .unwrap();
        cell
    }

    fn place(kernel: &mut GeomKernel, parent: CellKey, template: CellKey) -> InstKey {
        kernel
            .insert_instance(
                parent,
                template,
                Transformation::identity(),
                Point::zero(),
                Point::zero(),
                1,
                1,
            )
            .unwrap()
    }

    #[test]
    fn transform_left_multiplies() {
        let mut kernel = GeomKernel::new();
        let sq = unit_square(&mut kernel);
        let top = kernel.create_cell("top");
        let key = place(&mut kernel, top, sq);

        kernel.transform(key, Transformation::rotate(90.)).unwrap();
        kernel.transform(key, Transformation::translate(5., 0.)).unwrap();
        let bbox = kernel.bbox(key).unwrap();
        assert_eq!(bbox, Bbox::new(Point::new(4., 0.), Point::new(5., 1.)));
    }

    #[test]
    fn array_bbox_covers_every_copy() {
        let mut kernel = GeomKernel::new();
        let sq = unit_square(&mut kernel);
        let top = kernel.create_cell("top");
        let key = kernel
            .insert_instance(
                top,
                sq,
                Transformation::identity(),
                Point::new(2., 0.),
                Point::new(0., 3.),
                3,
                2,
            )
            .unwrap();
        assert_eq!(
            kernel.bbox(key).unwrap(),
            Bbox::new(Point::zero(), Point::new(5., 4.))
        );
        assert_eq!(kernel.polygons(top, Transformation::identity()).unwrap().len(), 6);

        // Rotating the array rotates its displacement vectors too.
        kernel.transform(key, Transformation::rotate(90.)).unwrap();
        let inst = kernel.instance(key).unwrap();
        assert_eq!(inst.a, Point::new(0., 2.));
        assert_eq!(inst.b, Point::new(-3., 0.));
    }

    #[test]
    fn flatten_destroys_handles() {
        let mut kernel = GeomKernel::new();
        let sq = unit_square(&mut kernel);
        let top = kernel.create_cell("top");
        let key = place(&mut kernel, top, sq);
        kernel.transform(key, Transformation::translate(1., 1.)).unwrap();

        assert_eq!(kernel.flatten(top).unwrap(), 1);
        assert!(!kernel.is_valid(key));
        assert_eq!(kernel.transformation(key), Err(KernelError::StaleInstance));
        assert!(kernel.instances(top).unwrap().is_empty());
        assert_eq!(
            kernel.elements(top).unwrap()[0].inner.bbox(),
            Bbox::new(Point::new(1., 1.), Point::new(2., 2.))
        );
    }

    #[test]
    fn delete_cell_destroys_children_and_users() {
        let mut kernel = GeomKernel::new();
        let sq = unit_square(&mut kernel);
        let mid = kernel.create_cell("mid");
        let top = kernel.create_cell("top");
        let inner = place(&mut kernel, mid, sq);
        let outer = place(&mut kernel, top, mid);

        kernel.delete_cell(mid).unwrap();
        assert!(!kernel.is_valid(inner));
        assert!(!kernel.is_valid(outer));
        assert!(kernel.instances(top).unwrap().is_empty());
        assert_eq!(kernel.delete_cell(mid), Err(KernelError::CellNotFound));
        assert!(!kernel.has_cell(mid));
        assert_eq!(kernel.cell_name(top).map(|n| n.as_str()), Ok("top"));
        assert!(!kernel.destroy(outer));
    }

    #[test]
    fn set_transformation_replaces() {
        let mut kernel = GeomKernel::new();
        let sq = unit_square(&mut kernel);
        let top = kernel.create_cell("top");
        let key = place(&mut kernel, top, sq);

        kernel.transform(key, Transformation::rotate(45.)).unwrap();
        kernel
            .set_transformation(key, Transformation::translate(2., 0.))
            .unwrap();
        assert_eq!(
            kernel.transformation(key),
            Ok(Transformation::translate(2., 0.))
        );
        kernel.destroy(key);
        assert_eq!(
            kernel.set_transformation(key, Transformation::identity()),
            Err(KernelError::StaleInstance)
        );
    }

    #[test]
    fn contains_cell_walks_hierarchy() {
        let mut kernel = GeomKernel::new();
        let sq = unit_square(&mut kernel);
        let mid = kernel.create_cell("mid");
        let top = kernel.create_cell("top");
        place(&mut kernel, mid, sq);
        place(&mut kernel, top, mid);

        assert!(kernel.contains_cell(top, sq));
        assert!(kernel.contains_cell(mid, mid));
        assert!(!kernel.contains_cell(sq, top));
    }
}
