use crate::model::Candle;

/// 제한된 크기의 캔들 저장소
///
/// 지정된 최대 크기를 유지하며 캔들을 저장합니다.
/// 최대 크기를 초과하면 가장 오래된 캔들이 제거됩니다.
/// 캔들은 datetime 기준 내림차순으로 저장됩니다 (최신 캔들이 먼저 옴).
/// 같은 시각의 캔들이 다시 들어오면 진행 중인 캔들로 보고 교체합니다.
pub struct CandleStore<T: Candle> {
    items: Vec<T>,
    pub max_size: usize,
}

impl<T> CandleStore<T>
where
    T: Candle,
{
    /// 새로운 CandleStore 인스턴스를 생성합니다.
    ///
    /// # Arguments
    /// * `items` - 초기 캔들 목록 (순서 무관)
    /// * `max_size` - 저장소의 최대 크기
    ///
    /// # Returns
    /// * `CandleStore<T>` - 생성된 저장소 인스턴스
    pub fn new(items: Vec<T>, max_size: usize) -> CandleStore<T> {
        let mut store = CandleStore {
            items: Vec::with_capacity(items.len().min(max_size)),
            max_size,
        };
        for item in items {
            store.add(item);
        }
        store
    }

    /// 캔들을 datetime 기준 내림차순 위치에 삽입합니다.
    ///
    /// 같은 시각의 캔들이 이미 있으면 새 캔들로 교체합니다.
    ///
    /// # Arguments
    /// * `data` - 삽입할 캔들
    pub fn add(&mut self, data: T) {
        match self
            .items
            .binary_search_by(|item| data.datetime().cmp(&item.datetime()))
        {
            Ok(idx) => {
                log::trace!("동일 시각 캔들 교체: {}", data.datetime());
                self.items[idx] = data;
            }
            Err(idx) => {
                self.items.insert(idx, data);
                if self.items.len() > self.max_size {
                    self.items.truncate(self.max_size);
                }
            }
        }
    }

    /// 저장소에 있는 캔들 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 저장소가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 가장 최신 캔들
    pub fn latest(&self) -> Option<&T> {
        self.items.first()
    }

    /// 최신 캔들 기준 `index`번째 과거 캔들 (0이 최신)
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// 최신순 캔들 슬라이스
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// 저장된 캔들을 시간 순서대로 정렬하여 반환합니다.
    ///
    /// # Returns
    /// * `Vec<T>` - 오래된 캔들부터 정렬된 목록
    pub fn get_time_ordered_items(&self) -> Vec<T> {
        let mut items = self.items.clone();
        items.reverse();
        items
    }

    /// 시간 순서의 종가 목록
    pub fn closes(&self) -> Vec<f64> {
        self.items.iter().rev().map(|c| c.close_price()).collect()
    }

    /// 시간 순서의 고가 목록
    pub fn highs(&self) -> Vec<f64> {
        self.items.iter().rev().map(|c| c.high_price()).collect()
    }

    /// 시간 순서의 저가 목록
    pub fn lows(&self) -> Vec<f64> {
        self.items.iter().rev().map(|c| c.low_price()).collect()
    }
}
