//! The VSIDS branching heuristic.
//!
//! The VSIDS (Variable State Independent Decaying Sum) branching heuristic keeps an activity
//! value for each variable. For each conflict some variables are bumped, which means that their
//! activity is increased by a constant. After bumping some variables, the activity of all
//! variables is decayed by multiplying it with a constant below 1.
//!
//! When a decision is made, it branches on the variable with the highest activity among the
//! unassigned variables.
//!
//! There are a few variants that differ in which variables are bumped. Occsat follows Minisat
//! (and others) by bumping all variables in the conflict clause and all variables resolved on
//! during conflict analysis.

use ordered_float::OrderedFloat;

use occsat_formula::Var;

use crate::config::SolverConfig;

/// The VSIDS branching heuristic.
///
/// As an optimization instead of decaying all activities each conflict, the bump value is divided
/// by the decay factor each conflict. When this would cause a value to overflow all activities
/// and the bump value are scaled down. Apart from a scaling factor that is the same for all
/// involved values, this is equivalent to the naive implementation. As we only care about the
/// order of activities we can ignore the scaling factor.
pub struct Vsids {
    /// The activity of each variable.
    activity: Vec<OrderedFloat<f32>>,
    /// A binary max-heap of the variables.
    heap: Vec<Var>,
    /// The position in the binary heap for each variable.
    position: Vec<Option<usize>>,
    /// The value to add on bumping.
    bump: f32,
    /// The inverse of the decay factor.
    inv_decay: f32,
}

impl Default for Vsids {
    fn default() -> Vsids {
        Vsids {
            activity: vec![],
            heap: vec![],
            position: vec![],
            bump: 1.0,
            inv_decay: 1.0 / SolverConfig::default().vsids_decay,
        }
    }
}

impl Vsids {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        let old_count = self.activity.len();
        debug_assert!(!self.heap.iter().any(|&v| v.index() >= count));
        self.activity.resize(count, OrderedFloat(0.0));
        self.position.resize(count, None);

        for i in old_count..count {
            self.make_available(Var::from_index(i));
        }
    }

    /// Rescale activities if any value exceeds this value.
    fn rescale_limit() -> f32 {
        std::f32::MAX / 16.0
    }

    /// Change the decay factor.
    pub fn set_decay(&mut self, decay: f32) {
        assert!(decay < 1.0);
        assert!(decay > 1.0 / 16.0);
        self.inv_decay = 1.0 / decay;
    }

    /// Bump a variable by increasing its activity.
    pub fn bump(&mut self, var: Var) {
        let rescale = {
            let value = &mut self.activity[var.index()];
            value.0 += self.bump;
            value.0 >= Self::rescale_limit()
        };
        if rescale {
            self.rescale();
        }
        if let Some(pos) = self.position[var.index()] {
            self.sift_up(pos);
        }
    }

    /// Decay all variable activities.
    pub fn decay(&mut self) {
        self.bump *= self.inv_decay;
        if self.bump >= Self::rescale_limit() {
            self.rescale();
        }
    }

    /// Rescale all values to avoid an overflow.
    fn rescale(&mut self) {
        let rescale_factor = 1.0 / Self::rescale_limit();
        for activity in self.activity.iter_mut() {
            activity.0 *= rescale_factor;
        }
        self.bump *= rescale_factor;
    }

    /// Add a variable to the heap unless it is already present.
    pub fn make_available(&mut self, var: Var) {
        if self.position[var.index()].is_none() {
            let position = self.heap.len();
            self.position[var.index()] = Some(position);
            self.heap.push(var);
            self.sift_up(position);
        }
    }

    /// Remove and return the variable with the highest activity.
    pub fn pop(&mut self) -> Option<Var> {
        let top = *self.heap.first()?;
        self.position[top.index()] = None;

        let last = self.heap.pop().expect("heap is non-empty");
        if !self.heap.is_empty() {
            self.heap[0] = last;
            self.position[last.index()] = Some(0);
            self.sift_down(0);
        }

        Some(top)
    }

    fn sift_up(&mut self, mut position: usize) {
        let var = self.heap[position];
        let activity = self.activity[var.index()];
        while position > 0 {
            let parent_position = (position - 1) / 2;
            let parent = self.heap[parent_position];
            if self.activity[parent.index()] >= activity {
                break;
            }
            self.heap[position] = parent;
            self.position[parent.index()] = Some(position);
            position = parent_position;
        }
        self.heap[position] = var;
        self.position[var.index()] = Some(position);
    }

    fn sift_down(&mut self, mut position: usize) {
        let var = self.heap[position];
        let activity = self.activity[var.index()];
        loop {
            let mut child_position = position * 2 + 1;
            if child_position >= self.heap.len() {
                break;
            }
            let right_position = child_position + 1;
            if right_position < self.heap.len()
                && self.activity[self.heap[right_position].index()]
                    > self.activity[self.heap[child_position].index()]
            {
                child_position = right_position;
            }
            let child = self.heap[child_position];
            if activity >= self.activity[child.index()] {
                break;
            }
            self.heap[position] = child;
            self.position[child.index()] = Some(position);
            position = child_position;
        }
        self.heap[position] = var;
        self.position[var.index()] = Some(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_by_activity() {
        let mut vsids = Vsids::default();
        vsids.set_var_count(6);

        for &(var, bumps) in &[(0usize, 1), (1, 3), (2, 2), (3, 5), (4, 0), (5, 4)] {
            for _ in 0..bumps {
                vsids.bump(Var::from_index(var));
            }
            vsids.decay();
        }

        let mut order = vec![];
        while let Some(var) = vsids.pop() {
            order.push(var.index());
        }

        assert_eq!(order.len(), 6);
        assert_eq!(order[0], 3);
        assert_eq!(*order.last().unwrap(), 4);
        // Later bumps weigh more due to decay, so 5 beats 1 despite one fewer bump
        assert!(
            order.iter().position(|&v| v == 5).unwrap()
                < order.iter().position(|&v| v == 1).unwrap()
        );

        // Popped variables can be made available again
        vsids.make_available(Var::from_index(2));
        assert_eq!(vsids.pop(), Some(Var::from_index(2)));
        assert_eq!(vsids.pop(), None);
    }
}
