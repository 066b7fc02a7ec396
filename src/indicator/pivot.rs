/// 시계열에서 피벗 저점/고점 인덱스 탐색
///
/// 인덱스 i의 값이 왼쪽 `left_bars`개, 오른쪽 `right_bars`개 값보다
/// 모두 엄격하게 작으면 저점, 엄격하게 크면 고점입니다. 같은 값이 있으면 피벗이 아닙니다.
///
/// # Arguments
/// * `series` - 시간 순서의 값 목록
/// * `left_bars` - 왼쪽 비교 폭
/// * `right_bars` - 오른쪽 비교 폭
///
/// # Returns
/// * `(Vec<usize>, Vec<usize>)` - (저점 인덱스, 고점 인덱스), 각각 오름차순
pub fn find_pivots(series: &[f64], left_bars: usize, right_bars: usize) -> (Vec<usize>, Vec<usize>) {
    let mut lows = Vec::new();
    let mut highs = Vec::new();

    if series.len() < left_bars + right_bars + 1 {
        return (lows, highs);
    }

    for i in left_bars..(series.len() - right_bars) {
        let value = series[i];
        let neighbors = series[i - left_bars..i]
            .iter()
            .chain(series[i + 1..=i + right_bars].iter());

        let mut is_low = true;
        let mut is_high = true;
        for &other in neighbors {
            if value >= other {
                is_low = false;
            }
            if value <= other {
                is_high = false;
            }
            if !is_low && !is_high {
                break;
            }
        }

        if is_low {
            lows.push(i);
        }
        if is_high {
            highs.push(i);
        }
    }

    (lows, highs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sawtooth_every_interior_index() {
        let series = [1.0, 3.0, 1.0, 3.0, 1.0, 3.0, 1.0];
        let (lows, highs) = find_pivots(&series, 1, 1);
        assert_eq!(lows, vec![2, 4]);
        assert_eq!(highs, vec![1, 3, 5]);
    }

    #[test]
    fn test_ties_disqualify() {
        let series = [3.0, 1.0, 1.0, 3.0];
        let (lows, highs) = find_pivots(&series, 1, 1);
        assert!(lows.is_empty());
        assert!(highs.is_empty());
    }

    #[test]
    fn test_too_short_series() {
        let (lows, highs) = find_pivots(&[1.0, 0.0], 1, 1);
        assert!(lows.is_empty() && highs.is_empty());
    }

    #[test]
    fn test_asymmetric_window() {
        let series = [5.0, 4.0, 3.0, 1.0, 2.0, 6.0];
        let (lows, _) = find_pivots(&series, 3, 2);
        assert_eq!(lows, vec![3]);
        // 오른쪽 폭 3이면 끝에 닿지 못함
        let (lows, _) = find_pivots(&series, 3, 3);
        assert!(lows.is_empty());
    }
}
