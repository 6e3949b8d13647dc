//! Selection handling for the watermark area editor.
//!
//! The editor owns the current [`Area`] and, while a pointer button is held,
//! an [`Interaction`] describing the gesture in progress. Pointer positions
//! are expected in percentage space (see [`Bounds::relative`]).
//!
//! [`Bounds::relative`]: crate::geometry::Bounds::relative

use crate::geometry::{self, Area, Handle, Point};

/// What the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Empty canvas: start drawing a new box.
    Canvas,
    /// The body of the current selection: move it.
    Body,
    /// One of the resize handles.
    Handle(Handle),
}

/// Gesture kind of an active interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Draw,
    Move,
    Resize(Handle),
}

/// Ephemeral state that exists only while a pointer button is held.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interaction {
    pub gesture: Gesture,
    pub start_point: Point,
    pub start_selection: Area,
    /// Selection before the gesture began, restored if a draw turns out to
    /// be a click.
    pub previous: Option<Area>,
}

/// Result of feeding one pointer event into the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    /// A gesture started.
    Started,
    /// The active gesture changed the selection.
    Dragging,
    /// The gesture finished and its selection was kept.
    Completed,
    /// A draw ended as a click; the previous selection was restored.
    Cancelled,
    /// Nothing happened.
    None,
}

/// Interactive editor for a single watermark area.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionEditor {
    initial: Option<Area>,
    selection: Option<Area>,
    interaction: Option<Interaction>,
}

impl SelectionEditor {
    /// Creates an editor seeded with an optional detected area.
    pub fn new(initial: Option<Area>) -> Self {
        let initial = initial.map(geometry::constrain);
        Self {
            initial,
            selection: initial,
            interaction: None,
        }
    }

    /// The area the editor was seeded with.
    pub fn initial(&self) -> Option<Area> {
        self.initial
    }

    pub fn selection(&self) -> Option<Area> {
        self.selection
    }

    pub fn interaction(&self) -> Option<&Interaction> {
        self.interaction.as_ref()
    }

    pub fn is_interacting(&self) -> bool {
        self.interaction.is_some()
    }

    /// Replaces the selection outright, e.g. from typed coordinates.
    pub fn set_selection(&mut self, area: Option<Area>) {
        self.interaction = None;
        self.selection = area.map(geometry::constrain);
    }

    /// Handles a pointer press.
    ///
    /// Moving or resizing without a selection is ignored.
    pub fn pointer_down(&mut self, point: Point, target: Target) -> SelectionEvent {
        let gesture = match target {
            Target::Canvas => Gesture::Draw,
            Target::Body => Gesture::Move,
            Target::Handle(handle) => Gesture::Resize(handle),
        };

        let start_selection = match gesture {
            Gesture::Draw => {
                let fresh = Area::new(point.x, point.y, 0.0, 0.0);
                let previous = self.selection.replace(fresh);
                self.interaction = Some(Interaction {
                    gesture,
                    start_point: point,
                    start_selection: fresh,
                    previous,
                });
                return SelectionEvent::Started;
            }
            _ => match self.selection {
                Some(current) => current,
                None => return SelectionEvent::None,
            },
        };

        self.interaction = Some(Interaction {
            gesture,
            start_point: point,
            start_selection,
            previous: self.selection,
        });
        SelectionEvent::Started
    }

    /// Handles pointer movement while a button is held.
    pub fn pointer_move(&mut self, point: Point) -> SelectionEvent {
        let Some(interaction) = self.interaction else {
            return SelectionEvent::None;
        };

        let dx = point.x - interaction.start_point.x;
        let dy = point.y - interaction.start_point.y;

        let raw = match interaction.gesture {
            Gesture::Draw => geometry::draw(interaction.start_point, point),
            Gesture::Move => geometry::translate(interaction.start_selection, dx, dy),
            Gesture::Resize(handle) => {
                geometry::resize(interaction.start_selection, handle, dx, dy)
            }
        };

        self.selection = Some(geometry::constrain(raw));
        SelectionEvent::Dragging
    }

    /// Handles the pointer release, ending the gesture.
    pub fn pointer_up(&mut self) -> SelectionEvent {
        let Some(interaction) = self.interaction.take() else {
            return SelectionEvent::None;
        };

        let was_click = self.selection.is_some_and(|s| s.is_click());
        if interaction.gesture == Gesture::Draw && was_click {
            self.selection = interaction.previous;
            return SelectionEvent::Cancelled;
        }
        SelectionEvent::Completed
    }

    /// Whether [`confirm`](Self::confirm) would yield an area.
    pub fn can_confirm(&self) -> bool {
        self.confirm().is_some()
    }

    /// The area to hand downstream: the current selection when it is
    /// valid, otherwise the seeded area.
    pub fn confirm(&self) -> Option<Area> {
        match self.selection {
            Some(selection) if selection.is_valid() => Some(selection),
            _ => self.initial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn drag_on_canvas_draws_a_box() {
        let mut editor = SelectionEditor::new(None);
        assert_eq!(editor.pointer_down(pt(10.0, 10.0), Target::Canvas), SelectionEvent::Started);
        assert_eq!(editor.pointer_move(pt(30.0, 25.0)), SelectionEvent::Dragging);
        assert_eq!(editor.pointer_up(), SelectionEvent::Completed);
        assert_eq!(editor.selection(), Some(Area::new(10.0, 10.0, 20.0, 15.0)));
        assert!(!editor.is_interacting());
    }

    #[test]
    fn click_restores_previous_selection() {
        let detected = Area::new(70.0, 80.0, 20.0, 10.0);
        let mut editor = SelectionEditor::new(Some(detected));
        editor.pointer_down(pt(5.0, 5.0), Target::Canvas);
        assert_eq!(editor.pointer_up(), SelectionEvent::Cancelled);
        assert_eq!(editor.selection(), Some(detected));
    }

    #[test]
    fn click_without_prior_selection_restores_none() {
        let mut editor = SelectionEditor::new(None);
        editor.pointer_down(pt(50.0, 50.0), Target::Canvas);
        assert_eq!(editor.pointer_up(), SelectionEvent::Cancelled);
        assert_eq!(editor.selection(), None);
    }

    #[test]
    fn click_restores_pre_draw_value_not_the_seed() {
        let mut editor = SelectionEditor::new(Some(Area::new(70.0, 80.0, 20.0, 10.0)));
        editor.set_selection(Some(Area::new(10.0, 10.0, 10.0, 10.0)));
        editor.pointer_down(pt(50.0, 50.0), Target::Canvas);
        editor.pointer_up();
        assert_eq!(editor.selection(), Some(Area::new(10.0, 10.0, 10.0, 10.0)));
    }

    #[test]
    fn move_is_clamped_after_the_fact() {
        let mut editor = SelectionEditor::new(Some(Area::new(10.0, 10.0, 20.0, 20.0)));
        editor.pointer_down(pt(20.0, 20.0), Target::Body);
        editor.pointer_move(pt(0.0, 0.0));
        assert_eq!(editor.selection(), Some(Area::new(0.0, 0.0, 20.0, 20.0)));
        editor.pointer_move(pt(95.0, 20.0));
        let s = editor.selection().unwrap();
        assert_eq!(s.x, 85.0);
        assert_eq!(s.width, 15.0);
        assert_eq!(editor.pointer_up(), SelectionEvent::Completed);
    }

    #[test]
    fn move_without_selection_is_ignored() {
        let mut editor = SelectionEditor::new(None);
        assert_eq!(editor.pointer_down(pt(5.0, 5.0), Target::Body), SelectionEvent::None);
        assert_eq!(editor.pointer_move(pt(6.0, 6.0)), SelectionEvent::None);
        assert_eq!(editor.pointer_up(), SelectionEvent::None);
    }

    #[test]
    fn resize_handle_flips_past_opposite_edge() {
        let mut editor = SelectionEditor::new(Some(Area::new(40.0, 40.0, 10.0, 10.0)));
        editor.pointer_down(pt(40.0, 40.0), Target::Handle(Handle::TopLeft));
        editor.pointer_move(pt(60.0, 55.0));
        editor.pointer_up();
        assert_eq!(editor.selection(), Some(Area::new(50.0, 50.0, 10.0, 5.0)));
    }

    #[test]
    fn confirm_falls_back_to_seed() {
        let seed = Area::new(75.0, 78.0, 22.0, 12.0);
        let mut editor = SelectionEditor::new(Some(seed));
        editor.set_selection(Some(Area::new(10.0, 10.0, 30.0, 30.0)));
        assert_eq!(editor.confirm(), Some(Area::new(10.0, 10.0, 30.0, 30.0)));

        editor.set_selection(None);
        assert_eq!(editor.confirm(), Some(seed));

        let empty = SelectionEditor::new(None);
        assert!(!empty.can_confirm());
    }
}
