/// Next row to hand out. Only moves forward.
#[derive(Debug, Clone)]
pub struct RowCursor {
    next: u32,
    rows: u32,
}

impl RowCursor {
    pub fn new(rows: u32) -> Self {
        Self { next: 0, rows }
    }

    /// Take the next row, or `None` once every row was handed out.
    pub fn advance(&mut self) -> Option<u32> {
        if self.next < self.rows {
            let row = self.next;
            self.next += 1;
            Some(row)
        } else {
            None
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.rows
    }

    /// Rows handed out so far.
    pub fn issued(&self) -> u32 {
        self.next
    }
}

/// Rows whose result has been received.
#[derive(Debug, Clone)]
pub struct CompletionSet {
    done: Vec<bool>,
    count: u32,
}

impl CompletionSet {
    pub fn new(rows: u32) -> Self {
        Self {
            done: vec![false; rows as usize],
            count: 0,
        }
    }

    pub fn contains(&self, row: u32) -> bool {
        self.done.get(row as usize).copied().unwrap_or(false)
    }

    /// Mark `row` done. Returns `false` if it already was.
    pub fn insert(&mut self, row: u32) -> bool {
        match self.done.get_mut(row as usize) {
            Some(slot) if !*slot => {
                *slot = true;
                self.count += 1;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count as usize == self.done.len()
    }
}
