/*
 *  frame.rs
 *
 *  CellScope - every gram counts
 *	(c) 2024-25 CellScope authors
 *
 *	TODO:
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;

/// A runtime-sized monochrome framebuffer the trace view draws into.
///
/// Doubles as the terminal backend: [`to_terminal`](Self::to_terminal)
/// emits the frame as text rows, two pixel rows per character cell using
/// half-block glyphs so a 64-row frame fits in 32 terminal lines.
#[derive(Debug, Clone)]
pub struct MonoFrame {
    pixels: Vec<bool>,
    w: usize,
    h: usize,
}

impl MonoFrame {
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { pixels: vec![false; w * h], w, h }
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    pub fn clear_frame(&mut self) {
        self.pixels.fill(false);
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < self.w && y < self.h && self.pixels[y * self.w + x]
    }

    /// Count of lit pixels, handy for tests and for a cheap dirty check.
    pub fn lit(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }

    /// Map (x,y) to linear index; returns None if out of bounds
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }

    /// Render the frame as terminal text, top row first.
    pub fn to_terminal(&self) -> String {
        let mut out = String::with_capacity((self.w + 1) * self.h.div_ceil(2));
        for row_pair in 0..self.h.div_ceil(2) {
            let top = row_pair * 2;
            let bottom = top + 1;
            for x in 0..self.w {
                let upper = self.pixel(x, top);
                let lower = bottom < self.h && self.pixel(x, bottom);
                out.push(match (upper, lower) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
            }
            out.push('\n');
        }
        out
    }
}

impl OriginDimensions for MonoFrame {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl DrawTarget for MonoFrame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.pixels[i] = c.is_on();
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixels.fill(color.is_on());
        Ok(())
    }
}
