//! Human-like pointer and keyboard driving on top of a [`MeetingPage`].
//!
//! [`HumanInput`] owns its random source and tracked pointer position. Every
//! interaction moves the pointer along a Bezier path, clicks with a short
//! press-release gap, and types with per-keystroke delays, occasional typos
//! that get corrected, and rare thinking pauses. With realistic movement
//! disabled all of that collapses to direct, instant actions, which keeps
//! tests fast and deterministic.

use crate::browser::{ElementRef, MeetingPage};
use crate::error::{MeetError, MeetResult};
use crate::input::bezier::{generate_human_path, Point};
use crate::input::timing::{chance, DelayRange};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Bounds on intermediate positions in one pointer move.
const MIN_PATH_STEPS: usize = 10;
const MAX_PATH_STEPS: usize = 25;

/// Probability of a typo on any given keystroke.
const TYPO_RATE: f64 = 0.02;
/// Probability of a longer thinking pause between keystrokes.
const THINKING_PAUSE_RATE: f64 = 0.01;

/// Drives a page with human-like pointer movement and typing.
pub struct HumanInput {
    rng: StdRng,
    position: Point,
    realistic: bool,
    action_delay: DelayRange,
    keystroke_delay: DelayRange,
}

impl HumanInput {
    /// Creates a new driver.
    ///
    /// With `seed` set, every path, delay, and typo is reproducible.
    pub fn new(realistic: bool, action_delay: DelayRange, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            position: Point::origin(),
            realistic,
            action_delay,
            keystroke_delay: DelayRange::keystroke(),
        }
    }

    /// Current tracked pointer position.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Sleeps for one sampled inter-action delay.
    pub async fn pause(&mut self) {
        if !self.realistic {
            return;
        }
        let delay = self.action_delay.sample(&mut self.rng);
        tokio::time::sleep(delay).await;
    }

    /// Moves the pointer to the given coordinates.
    ///
    /// Realistic mode walks a randomized curve with 10-25 intermediate
    /// positions and millisecond pacing between them.
    pub async fn move_to(&mut self, page: &dyn MeetingPage, x: f64, y: f64) -> MeetResult<()> {
        let target = Point::new(x, y);
        if !self.realistic {
            page.mouse_move(x, y).await?;
            self.position = target;
            return Ok(());
        }

        let steps = self.rng.gen_range(MIN_PATH_STEPS..=MAX_PATH_STEPS);
        let path = generate_human_path(self.position, target, steps, &mut self.rng);
        for point in &path {
            page.mouse_move(point.x, point.y).await?;
            let step_ms = self.rng.gen_range(4..=14);
            tokio::time::sleep(Duration::from_millis(step_ms)).await;
        }
        self.position = target;
        Ok(())
    }

    /// Moves to the coordinates and clicks there.
    pub async fn click_at(&mut self, page: &dyn MeetingPage, x: f64, y: f64) -> MeetResult<()> {
        self.move_to(page, x, y).await?;
        if self.realistic {
            let press_ms = self.rng.gen_range(40..=120);
            page.mouse_down(x, y).await?;
            tokio::time::sleep(Duration::from_millis(press_ms)).await;
            page.mouse_up(x, y).await?;
        } else {
            page.mouse_down(x, y).await?;
            page.mouse_up(x, y).await?;
        }
        Ok(())
    }

    /// Clicks an already-located element.
    ///
    /// The click lands near the element center with a small random offset,
    /// never on the exact same pixel.
    pub async fn click_element(
        &mut self,
        page: &dyn MeetingPage,
        element: &ElementRef,
    ) -> MeetResult<()> {
        let (cx, cy) = element.center();
        let (x, y) = if self.realistic {
            let max_dx = (element.width / 4.0).max(1.0);
            let max_dy = (element.height / 4.0).max(1.0);
            (
                cx + self.rng.gen_range(-max_dx..max_dx),
                cy + self.rng.gen_range(-max_dy..max_dy),
            )
        } else {
            (cx, cy)
        };
        self.click_at(page, x, y).await
    }

    /// Finds an element by selector and clicks it.
    pub async fn move_and_click(
        &mut self,
        page: &dyn MeetingPage,
        selector: &str,
    ) -> MeetResult<()> {
        let element = page
            .query(selector)
            .await?
            .ok_or_else(|| MeetError::ElementNotFound(selector.to_string()))?;
        self.click_element(page, &element).await
    }

    /// Clicks a field, clears it, and types `text` with human pacing.
    ///
    /// Typos press an adjacent key, pause, and correct with Backspace.
    pub async fn type_text(
        &mut self,
        page: &dyn MeetingPage,
        selector: &str,
        text: &str,
    ) -> MeetResult<()> {
        let element = page
            .query(selector)
            .await?
            .ok_or_else(|| MeetError::ElementNotFound(selector.to_string()))?;
        self.type_in_element(page, &element, text).await
    }

    /// Like [`Self::type_text`] but for an already-located field.
    pub async fn type_in_element(
        &mut self,
        page: &dyn MeetingPage,
        element: &ElementRef,
        text: &str,
    ) -> MeetResult<()> {
        self.click_element(page, element).await?;

        // clear whatever the field already holds
        page.press_key("Control+a").await?;
        page.press_key("Backspace").await?;

        for c in text.chars() {
            if self.realistic && c.is_ascii_alphabetic() && chance(&mut self.rng, TYPO_RATE) {
                let wrong = adjacent_key(c, &mut self.rng);
                page.type_char(wrong).await?;
                tokio::time::sleep(self.keystroke_delay.sample(&mut self.rng)).await;
                page.press_key("Backspace").await?;
                tokio::time::sleep(self.keystroke_delay.sample(&mut self.rng)).await;
            }

            page.type_char(c).await?;

            if self.realistic {
                tokio::time::sleep(self.keystroke_delay.sample(&mut self.rng)).await;
                if chance(&mut self.rng, THINKING_PAUSE_RATE) {
                    let pause_ms = self.rng.gen_range(400..=1500);
                    tokio::time::sleep(Duration::from_millis(pause_ms)).await;
                }
            }
        }
        Ok(())
    }
}

/// Picks a QWERTY-adjacent key for typo simulation.
fn adjacent_key<R: Rng>(c: char, rng: &mut R) -> char {
    let lower = c.to_ascii_lowercase();
    let neighbors: &str = match lower {
        'a' => "qws",
        'b' => "vgn",
        'c' => "xdv",
        'd' => "sfe",
        'e' => "wrd",
        'f' => "dgr",
        'g' => "fht",
        'h' => "gjy",
        'i' => "uok",
        'j' => "hku",
        'k' => "jli",
        'l' => "ko",
        'm' => "nj",
        'n' => "bmh",
        'o' => "ipl",
        'p' => "ol",
        'q' => "wa",
        'r' => "etf",
        's' => "adw",
        't' => "ryg",
        'u' => "yij",
        'v' => "cbf",
        'w' => "qes",
        'x' => "zcs",
        'y' => "tuh",
        'z' => "xa",
        _ => return c,
    };
    let bytes = neighbors.as_bytes();
    let picked = bytes[rng.gen_range(0..bytes.len())] as char;
    if c.is_ascii_uppercase() {
        picked.to_ascii_uppercase()
    } else {
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_key_is_different_letter() {
        let mut rng = StdRng::seed_from_u64(3);
        for c in "abcdefghijklmnopqrstuvwxyz".chars() {
            let adj = adjacent_key(c, &mut rng);
            assert_ne!(adj, c);
            assert!(adj.is_ascii_lowercase());
        }
    }

    #[test]
    fn test_adjacent_key_preserves_case() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(adjacent_key('E', &mut rng).is_ascii_uppercase());
    }

    #[test]
    fn test_adjacent_key_passes_through_non_letters() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(adjacent_key('3', &mut rng), '3');
        assert_eq!(adjacent_key(' ', &mut rng), ' ');
    }

    #[test]
    fn test_new_starts_at_origin() {
        let input = HumanInput::new(true, DelayRange::action(), Some(1));
        assert_eq!(input.position(), Point::origin());
    }
}
