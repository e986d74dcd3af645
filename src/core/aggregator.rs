use crate::error::{Error, Result};
use crate::models::{Candidate, Selection};
use crate::sources::Source;

/// 공급자별 순위 창 배치. 등록 순서대로 `[offset+1, offset+window]`를 차지한다.
/// 공급자 id는 배치 안에서 한 번만 나온다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowLayout {
    windows: Vec<(String, usize)>,
}

impl WindowLayout {
    /// 창을 하나 덧붙인다. 이미 있는 공급자 id면 설정 오류다.
    pub fn push(&mut self, provider_id: &str, window: usize) -> Result<()> {
        if self.slot(provider_id).is_some() {
            return Err(Error::Config(format!(
                "공급자가 두 번 등록되었습니다: {}",
                provider_id
            )));
        }
        self.windows.push((provider_id.to_string(), window));
        Ok(())
    }

    /// 전체 순위의 상한 (창 크기 합).
    pub fn total(&self) -> usize {
        self.windows.iter().map(|(_, w)| w).sum()
    }

    /// (창 순서, 오프셋, 창 크기)
    fn slot(&self, provider_id: &str) -> Option<(usize, usize, usize)> {
        let mut offset = 0;
        for (index, (id, window)) in self.windows.iter().enumerate() {
            if id == provider_id {
                return Some((index, offset, *window));
            }
            offset += window;
        }
        None
    }

    /// 전체 순위를 `(공급자, 창 안 위치)`로 되돌린다.
    pub fn locate(&self, rank: usize) -> Result<Selection> {
        let out_of_range = || {
            Error::Selection(format!(
                "{}은(는) 1~{} 범위를 벗어났습니다",
                rank,
                self.total()
            ))
        };
        if rank == 0 {
            return Err(out_of_range());
        }
        let mut offset = 0;
        for (id, window) in &self.windows {
            if rank <= offset + window {
                return Ok(Selection {
                    provider_id: id.clone(),
                    local_index: rank - offset - 1,
                });
            }
            offset += window;
        }
        Err(out_of_range())
    }

    /// `locate`의 역연산.
    pub fn rank_of(&self, selection: &Selection) -> Option<usize> {
        let (_, offset, window) = self.slot(&selection.provider_id)?;
        (selection.local_index < window).then_some(offset + selection.local_index + 1)
    }
}

/// 여러 공급자의 검색 결과를 하나의 전체 순위 공간으로 합친 것.
/// 후보는 배치의 창 순서대로 공급자별로 보관한다.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub layout: WindowLayout,
    windows: Vec<Vec<Candidate>>,
}

impl SearchResult {
    /// 전체 순위 순서의 모든 후보.
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.windows.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.iter().all(Vec::is_empty)
    }

    /// 선택이 가리키는 후보. 공급자가 채우지 못한 자리면 선택 오류다.
    pub fn get(&self, selection: &Selection) -> Result<&Candidate> {
        self.layout
            .slot(&selection.provider_id)
            .filter(|(_, _, window)| selection.local_index < *window)
            .and_then(|(index, _, _)| self.windows.get(index)?.get(selection.local_index))
            .ok_or_else(|| {
                Error::Selection(format!(
                    "{}의 {}번째 결과가 없습니다",
                    selection.provider_id,
                    selection.local_index + 1
                ))
            })
    }

    /// 전체 순위로 후보를 고른다.
    /// 범위 밖이거나 공급자가 채우지 못한 자리면 선택 오류다.
    pub fn select(&self, rank: usize) -> Result<(Selection, &Candidate)> {
        let selection = self.layout.locate(rank)?;
        let candidate = self.get(&selection)?;
        Ok((selection, candidate))
    }

    /// 사용자가 입력한 문자열을 순위로 해석해 고른다.
    pub fn select_input(&self, input: &str) -> Result<(Selection, &Candidate)> {
        let rank: usize = input
            .trim()
            .parse()
            .map_err(|_| Error::Selection(format!("숫자가 아닙니다: {}", input.trim())))?;
        self.select(rank)
    }
}

/// 등록된 공급자들에게 차례로 검색을 요청해 결과를 합친다.
pub struct Aggregator<'a, S: Source + ?Sized> {
    sources: Vec<&'a S>,
}

impl<'a, S: Source + ?Sized> Aggregator<'a, S> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register(mut self, source: &'a S) -> Self {
        self.sources.push(source);
        self
    }

    /// 같은 id가 두 번 등록되어 있으면 설정 오류다.
    pub fn layout(&self) -> Result<WindowLayout> {
        let mut layout = WindowLayout::default();
        for source in &self.sources {
            layout.push(source.id(), source.window())?;
        }
        Ok(layout)
    }

    /// 공급자마다 창 크기만큼 검색하고 전체 순위를 매긴다.
    /// 창보다 많이 돌려준 결과는 잘라낸다. 공급자 하나라도 실패하면 전체가 실패한다.
    pub fn search(&self, query: &str) -> Result<SearchResult> {
        let layout = self.layout()?;
        let mut windows = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let window = source.window();
            log::info!("{}에서 검색 중: {}", source.id(), query);
            let found = source.search(query, window)?;
            log::debug!("{}: {}건", source.id(), found.len());

            let mut ranked = Vec::with_capacity(window.min(found.len()));
            for (local_index, c) in found.into_iter().take(window).enumerate() {
                let selection = Selection {
                    provider_id: source.id().to_string(),
                    local_index,
                };
                let global_rank = layout.rank_of(&selection).ok_or_else(|| {
                    Error::Selection(format!("{:?}에 순위를 매길 수 없습니다", selection))
                })?;
                ranked.push(Candidate { global_rank, ..c });
            }
            windows.push(ranked);
        }

        Ok(SearchResult { layout, windows })
    }
}
